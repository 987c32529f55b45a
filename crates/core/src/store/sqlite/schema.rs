diesel::table! {
    records (version) {
        version -> Binary,
        namespace -> Text,
        record_key -> Text,
        value_json -> Text,
        created_at -> BigInt,
    }
}
