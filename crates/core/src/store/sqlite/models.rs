use diesel::prelude::*;

use crate::{
    json,
    store::{
        JsonObject, StoreError, StoredRecord,
        sqlite::{PooledConnection, schema::records},
    },
    version::Version,
};

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordModel {
    pub version: Vec<u8>,
    pub namespace: String,
    pub record_key: String,
    pub value_json: String,
}

impl TryFrom<RecordModel> for StoredRecord {
    type Error = StoreError;

    fn try_from(model: RecordModel) -> Result<Self, Self::Error> {
        let version = Version::try_from(model.version.as_slice())?;
        let value: JsonObject = json::from_slice(model.value_json.as_bytes()).map_err(|e| {
            StoreError::Corrupt(format!(
                "record {} in {}: {}",
                hex::encode(&model.version),
                model.namespace,
                e
            ))
        })?;
        Ok(StoredRecord {
            version,
            key: model.record_key,
            value,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = records)]
pub struct NewRecord<'a> {
    pub version: &'a [u8],
    pub namespace: &'a str,
    pub record_key: &'a str,
    pub value_json: String,
    pub created_at: i64,
}

impl<'a> NewRecord<'a> {
    pub fn new(
        version: &'a Version,
        namespace: &'a str,
        record_key: &'a str,
        value_json: String,
    ) -> Self {
        Self {
            version: version.as_bytes(),
            namespace,
            record_key,
            value_json,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn insert(&self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(records::table)
            .values(self)
            .execute(conn)
    }
}

/// Highest version in the table, across every namespace.
pub fn latest_version(conn: &mut SqliteConnection) -> QueryResult<Option<Vec<u8>>> {
    records::table
        .select(records::version)
        .order(records::version.desc())
        .first(conn)
        .optional()
}

/// Records of one key after an optional version, in ascending version order.
pub fn find_after(
    conn: &mut PooledConnection,
    namespace: &str,
    record_key: &str,
    after: Option<&Version>,
) -> QueryResult<Vec<RecordModel>> {
    let mut query = records::table
        .filter(records::namespace.eq(namespace))
        .filter(records::record_key.eq(record_key))
        .into_boxed();

    if let Some(after) = after {
        query = query.filter(records::version.gt(after.as_bytes().to_vec()));
    }

    query
        .order(records::version.asc())
        .select(RecordModel::as_select())
        .load(conn)
}
