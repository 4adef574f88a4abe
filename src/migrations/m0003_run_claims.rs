use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0003_run_claims")
        .depends_on(&["0002_result_indexes"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "ALTER TABLE annotation_sessions ADD COLUMN run_owner TEXT",
        ))
}
