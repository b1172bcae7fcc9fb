//! Listing management, search and the owner earnings dashboard.

use chrono::{Datelike, NaiveDate, Utc};
use diesel::Connection;
use validator::Validate;

use models::{Amount, SearchSpaces, Space, SpaceForm, SpaceId, UpdateSpace, UserId};
use repos::{BookingsRepo, BookingsRepoImpl, DbPool, SpaceSearchResult, SpacesRepo, SpacesRepoImpl};

use super::error::{Conflict, Error, ErrorKind};
use super::types::{get_conn, ServiceResult};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct OwnerEarnings {
    pub total_earnings: Amount,
    pub total_bookings: i64,
    pub total_spaces: i64,
    /// Earned on paid completed/active bookings, awaiting transfer
    pub pending_payout: Amount,
    /// Paid bookings created in the current calendar month
    pub month_earnings: Amount,
}

pub trait SpaceService {
    /// Creates a pending listing; moderation activates it out-of-band
    fn create(&self, owner_id: UserId, form: SpaceForm) -> ServiceResult<Space>;
    fn get(&self, space_id: SpaceId) -> ServiceResult<Space>;
    /// Owner-only mutation (pause/resume, rates, photos, ...)
    fn update(&self, space_id: SpaceId, acting_user: UserId, update: UpdateSpace) -> ServiceResult<Space>;
    /// Owner-only; refused while live bookings reference the space
    fn delete(&self, space_id: SpaceId, acting_user: UserId) -> ServiceResult<Space>;
    fn search(&self, terms: SearchSpaces, limit: i64, offset: i64) -> ServiceResult<Vec<SpaceSearchResult>>;
    fn list_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<Space>>;
    fn owner_earnings(&self, owner_id: UserId) -> ServiceResult<OwnerEarnings>;
}

pub struct SpaceServiceImpl {
    pub db_pool: DbPool,
}

impl SpaceServiceImpl {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

impl SpaceService for SpaceServiceImpl {
    fn create(&self, owner_id: UserId, form: SpaceForm) -> ServiceResult<Space> {
        info!("Creating a space for owner {}", owner_id);

        form.validate().map_err(|e| Error::from(ErrorKind::Validation(e)))?;

        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);
        Ok(spaces_repo.create(form.into_new_space(owner_id))?)
    }

    fn get(&self, space_id: SpaceId) -> ServiceResult<Space> {
        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);
        spaces_repo.get(space_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))
    }

    fn update(&self, space_id: SpaceId, acting_user: UserId, update: UpdateSpace) -> ServiceResult<Space> {
        info!("User {} updating space {}", acting_user, space_id);

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Space, Error, _>(|| {
            let spaces_repo = SpacesRepoImpl::new(&*conn);

            let space = spaces_repo.get(space_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            if space.owner_id != acting_user {
                return Err(Error::from(ErrorKind::AccessDenied));
            }
            Ok(spaces_repo.update(space_id, update)?)
        })
    }

    fn delete(&self, space_id: SpaceId, acting_user: UserId) -> ServiceResult<Space> {
        info!("User {} deleting space {}", acting_user, space_id);

        let conn = get_conn(&self.db_pool)?;
        conn.transaction::<Space, Error, _>(|| {
            let spaces_repo = SpacesRepoImpl::new(&*conn);
            let bookings_repo = BookingsRepoImpl::new(&*conn);

            let space = spaces_repo.get(space_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
            if space.owner_id != acting_user {
                return Err(Error::from(ErrorKind::AccessDenied));
            }
            if bookings_repo.live_count_for_space(space_id)? > 0 {
                return Err(Error::from(ErrorKind::Conflict(Conflict::HasLiveBookings)));
            }

            spaces_repo.delete(space_id)?.ok_or_else(|| Error::from(ErrorKind::NotFound))
        })
    }

    fn search(&self, terms: SearchSpaces, limit: i64, offset: i64) -> ServiceResult<Vec<SpaceSearchResult>> {
        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);
        Ok(spaces_repo.search(terms, limit, offset)?)
    }

    fn list_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<Space>> {
        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);
        Ok(spaces_repo.list_by_owner(owner_id)?)
    }

    fn owner_earnings(&self, owner_id: UserId) -> ServiceResult<OwnerEarnings> {
        debug!("Computing earnings of owner {}", owner_id);

        let now = Utc::now().naive_utc();
        let month_start = NaiveDate::from_ymd(now.year(), now.month(), 1).and_hms(0, 0, 0);

        let conn = get_conn(&self.db_pool)?;
        let spaces_repo = SpacesRepoImpl::new(&*conn);
        let bookings_repo = BookingsRepoImpl::new(&*conn);

        let spaces = spaces_repo.list_by_owner(owner_id)?;
        let total_earnings = spaces
            .iter()
            .fold(Amount::zero(), |acc, s| acc.checked_add(s.total_earnings).unwrap_or(acc));
        let total_bookings = spaces.iter().map(|s| s.total_bookings as i64).sum();

        let payouts = bookings_repo.owner_payout_totals(owner_id, month_start)?;

        Ok(OwnerEarnings {
            total_earnings,
            total_bookings,
            total_spaces: spaces.len() as i64,
            pending_payout: payouts.pending_payout,
            month_earnings: payouts.month_earnings,
        })
    }
}
