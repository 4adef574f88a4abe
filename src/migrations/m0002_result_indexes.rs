use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0002_result_indexes")
        .depends_on(&["0001_initial_schema"])
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_results_gene ON annotation_results(gene)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX idx_results_consequence ON annotation_results(consequence)",
        ))
}
