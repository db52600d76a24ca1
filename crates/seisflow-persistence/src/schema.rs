//! Diesel schema (§3), hand-written to match `migrations/`. Replaceable
//! with `diesel print-schema` once a live database is available.

diesel::table! {
    web_services (id) {
        id -> BigInt,
        kind -> Text,
        url -> Text,
    }
}

diesel::table! {
    data_centers (id) {
        id -> BigInt,
        station_url -> Text,
        dataselect_url -> Text,
        organization_name -> Nullable<Text>,
    }
}

diesel::table! {
    downloads (id) {
        id -> BigInt,
        run_time -> Timestamptz,
        config -> Text,
        config_hash -> Text,
        program_version -> Text,
        errors -> Integer,
        warnings -> Integer,
        log -> Text,
    }
}

diesel::table! {
    events (id) {
        id -> BigInt,
        webservice_id -> BigInt,
        event_id -> Text,
        time -> Timestamptz,
        latitude -> Double,
        longitude -> Double,
        depth_km -> Double,
        magnitude -> Double,
    }
}

diesel::table! {
    stations (id) {
        id -> BigInt,
        datacenter_id -> BigInt,
        network -> Text,
        station -> Text,
        latitude -> Double,
        longitude -> Double,
        start_time -> Timestamptz,
        end_time -> Nullable<Timestamptz>,
        inventory_xml -> Nullable<Binary>,
    }
}

diesel::table! {
    channels (id) {
        id -> BigInt,
        station_id -> BigInt,
        location -> Text,
        channel -> Text,
        sample_rate -> Double,
    }
}

diesel::table! {
    segments (id) {
        id -> BigInt,
        channel_id -> BigInt,
        event_id -> BigInt,
        datacenter_id -> BigInt,
        download_id -> BigInt,
        event_distance_deg -> Double,
        arrival_time -> Timestamptz,
        request_start -> Timestamptz,
        request_end -> Timestamptz,
        start_time -> Nullable<Timestamptz>,
        end_time -> Nullable<Timestamptz>,
        sample_rate -> Nullable<Double>,
        data -> Nullable<Binary>,
        data_identifier -> Nullable<Text>,
        maxgap_numsamples -> Nullable<Double>,
        download_code -> Nullable<Integer>,
    }
}

diesel::table! {
    pipeline_events (id) {
        id -> BigInt,
        download_id -> BigInt,
        ts -> Timestamptz,
        kind -> Text,
        payload -> Jsonb,
    }
}

diesel::joinable!(events -> web_services (webservice_id));
diesel::joinable!(stations -> data_centers (datacenter_id));
diesel::joinable!(channels -> stations (station_id));
diesel::joinable!(segments -> channels (channel_id));
diesel::joinable!(segments -> events (event_id));
diesel::joinable!(segments -> data_centers (datacenter_id));
diesel::joinable!(segments -> downloads (download_id));
diesel::joinable!(pipeline_events -> downloads (download_id));

diesel::allow_tables_to_appear_in_same_query!(
    web_services,
    data_centers,
    downloads,
    events,
    stations,
    channels,
    segments,
    pipeline_events,
);
