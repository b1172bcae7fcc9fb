use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::{Bool, Double, VarChar};
use diesel::Connection;

use models::space::{haversine_miles, SearchSpaces};
use models::{Amount, NewSpace, Space, SpaceId, SpaceStatus, UpdateSpace, UserId};

use schema::spaces::dsl as SpacesDsl;

use super::types::RepoResult;

/// Search results are capped at this page size
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Candidate rows fetched per search before the in-memory amenity and geo
/// filters run; keeps a large table from being pulled into memory per request
const SEARCH_SCAN_LIMIT: i64 = 1000;

/// A search hit with its distance from the search point, when one was given
#[derive(Clone, Debug, Serialize)]
pub struct SpaceSearchResult {
    pub space: Space,
    pub distance_miles: Option<f64>,
}

pub struct SpacesRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait SpacesRepo {
    fn get(&self, space_id: SpaceId) -> RepoResult<Option<Space>>;
    fn create(&self, new_space: NewSpace) -> RepoResult<Space>;
    fn update(&self, space_id: SpaceId, update: UpdateSpace) -> RepoResult<Space>;
    fn delete(&self, space_id: SpaceId) -> RepoResult<Option<Space>>;
    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Space>>;
    /// Filtered, ranked listing search. SQL handles the cheap filters;
    /// amenity containment and the geo radius are applied to the fetched
    /// candidates, then pagination.
    fn search(&self, terms: SearchSpaces, limit: i64, offset: i64) -> RepoResult<Vec<SpaceSearchResult>>;
    /// Called when a booking completes: earnings += payout, bookings += 1
    fn credit_completed_booking(&self, space_id: SpaceId, payout: Amount) -> RepoResult<Space>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> SpacesRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> SpacesRepo for SpacesRepoImpl<'a, T> {
    fn get(&self, space_id: SpaceId) -> RepoResult<Option<Space>> {
        debug!("Getting a space with ID: {}", space_id);

        let query = SpacesDsl::spaces.filter(SpacesDsl::id.eq(space_id));
        let space = query.get_result(self.db_conn).optional()?;
        Ok(space)
    }

    fn create(&self, new_space: NewSpace) -> RepoResult<Space> {
        debug!("Creating a space with ID: {}", new_space.id);

        let command = diesel::insert_into(SpacesDsl::spaces).values(&new_space);
        let space = command.get_result::<Space>(self.db_conn)?;
        Ok(space)
    }

    fn update(&self, space_id: SpaceId, update: UpdateSpace) -> RepoResult<Space> {
        debug!("Updating a space with ID: {}", space_id);

        let filter = SpacesDsl::spaces.filter(SpacesDsl::id.eq(space_id));
        let space = diesel::update(filter).set(&update).get_result::<Space>(self.db_conn)?;
        Ok(space)
    }

    fn delete(&self, space_id: SpaceId) -> RepoResult<Option<Space>> {
        debug!("Deleting a space with ID: {}", space_id);

        let command = diesel::delete(SpacesDsl::spaces.filter(SpacesDsl::id.eq(space_id)));
        let space = command.get_result(self.db_conn).optional()?;
        Ok(space)
    }

    fn list_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<Space>> {
        debug!("Listing spaces of owner {}", owner_id);

        let query = SpacesDsl::spaces
            .filter(SpacesDsl::owner_id.eq(owner_id))
            .order(SpacesDsl::created_at.desc());
        let spaces = query.get_results(self.db_conn)?;
        Ok(spaces)
    }

    fn search(&self, terms: SearchSpaces, limit: i64, offset: i64) -> RepoResult<Vec<SpaceSearchResult>> {
        debug!("Searching spaces, limit={}, offset={}, terms {:?}", limit, offset, terms);

        let limit = limit.max(1).min(MAX_SEARCH_LIMIT);
        let offset = offset.max(0);

        let mut query = SpacesDsl::spaces
            .filter(SpacesDsl::status.eq(SpaceStatus::Active))
            .into_boxed();

        if let Some(ref city) = terms.city {
            query = query.filter(sql::<Bool>("city ILIKE ").bind::<VarChar, _>(format!("%{}%", city)));
        }
        if let Some(ref prefix) = terms.postcode_prefix {
            query = query.filter(sql::<Bool>("postcode ILIKE ").bind::<VarChar, _>(format!("{}%", prefix)));
        }
        if let Some(max_price) = terms.max_price_per_hour {
            query = query.filter(SpacesDsl::price_per_hour.le(max_price));
        }
        if let Some(ref space_type) = terms.space_type {
            query = query.filter(SpacesDsl::space_type.eq(space_type.clone()));
        }

        // Default ranking; replaced by distance ordering below when a geo
        // point was given. Postgres sorts NULLs first under DESC, so the
        // ordering is spelled out to keep unrated listings last.
        let candidates: Vec<Space> = query
            .order(sql::<Double>("average_rating DESC NULLS LAST, total_bookings DESC"))
            .limit(SEARCH_SCAN_LIMIT)
            .get_results(self.db_conn)?;

        let mut results: Vec<SpaceSearchResult> = candidates
            .into_iter()
            .filter(|space| terms.amenities.is_empty() || space.has_amenities(&terms.amenities))
            .filter_map(|space| match terms.geo {
                None => Some(SpaceSearchResult {
                    space,
                    distance_miles: None,
                }),
                Some(geo) => match (space.latitude, space.longitude) {
                    (Some(lat), Some(lon)) => {
                        let distance = haversine_miles(geo.latitude, geo.longitude, lat, lon);
                        if distance <= geo.radius_miles {
                            Some(SpaceSearchResult {
                                space,
                                distance_miles: Some(distance),
                            })
                        } else {
                            None
                        }
                    }
                    _ => None,
                },
            })
            .collect();

        if terms.geo.is_some() {
            results.sort_by(|a, b| {
                a.distance_miles
                    .partial_cmp(&b.distance_miles)
                    .unwrap_or(::std::cmp::Ordering::Equal)
            });
        }

        Ok(results.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    fn credit_completed_booking(&self, space_id: SpaceId, payout: Amount) -> RepoResult<Space> {
        debug!("Crediting space {} with payout {}", space_id, payout);

        let filter = SpacesDsl::spaces.filter(SpacesDsl::id.eq(space_id));
        let space = diesel::update(filter)
            .set((
                SpacesDsl::total_earnings.eq(SpacesDsl::total_earnings + payout),
                SpacesDsl::total_bookings.eq(SpacesDsl::total_bookings + 1),
            ))
            .get_result::<Space>(self.db_conn)?;
        Ok(space)
    }
}
