table! {
    spaces (id) {
        id -> Uuid,
        owner_id -> Uuid,
        title -> VarChar,
        description -> Nullable<Text>,
        address_line -> VarChar,
        city -> VarChar,
        postcode -> VarChar,
        country -> VarChar,
        latitude -> Nullable<Double>,
        longitude -> Nullable<Double>,
        space_type -> VarChar,
        price_per_hour -> BigInt,
        price_per_day -> Nullable<BigInt>,
        min_booking_hours -> Integer,
        max_booking_days -> Integer,
        amenities -> Jsonb,
        photos -> Jsonb,
        status -> VarChar,
        total_earnings -> BigInt,
        total_bookings -> Integer,
        average_rating -> Nullable<Double>,
        created_at -> Timestamp, // UTC 0, generated at db level
        updated_at -> Timestamp,
    }
}

table! {
    bookings (id) {
        id -> Uuid,
        space_id -> Uuid,
        renter_id -> Uuid,
        owner_id -> Uuid,
        start_time -> Timestamp,
        end_time -> Timestamp,
        vehicle_reg -> Nullable<VarChar>,
        vehicle_model -> Nullable<VarChar>,
        total_price -> BigInt,
        platform_fee -> BigInt,
        owner_payout -> BigInt,
        booking_status -> VarChar,
        payment_status -> VarChar,
        cancelled_by -> Nullable<VarChar>,
        cancellation_reason -> Nullable<Text>,
        check_in_time -> Nullable<Timestamp>,
        check_out_time -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    payments (id) {
        id -> Uuid,
        user_id -> Uuid,
        booking_type -> VarChar,
        booking_id -> Uuid,
        amount -> BigInt,
        currency -> VarChar,
        provider_payment_id -> Nullable<VarChar>,
        status -> VarChar,
        refund_amount -> Nullable<BigInt>,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}
