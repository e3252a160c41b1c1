use super::*;
use crate::dialect::Dialect;
use crate::query::{AggregateFunction, Bindings};
use crate::source::RecordingSource;

// ── In-memory source ──

struct Canned {
    dialect: Dialect,
    rows: Vec<Record>,
    affected: u64,
}

impl Canned {
    fn mysql(rows: Vec<Record>) -> Self {
        Self {
            dialect: Dialect::MySql,
            rows,
            affected: 0,
        }
    }
}

impl Source for Canned {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_all(&self, _: &str, _: &Bindings) -> BlueprintResult<Vec<Record>> {
        Ok(self.rows.clone())
    }

    async fn execute(&self, _: &str, _: &Bindings) -> BlueprintResult<u64> {
        Ok(self.affected)
    }
}

fn row(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn users(source: Canned) -> Blueprint<RecordingSource<Canned>> {
    let mut bp = Blueprint::new(RecordingSource::new(source));
    bp.add_pattern(
        "users",
        Pattern::new().table("users").columns(["id", "name"]),
    )
    .add_filter(
        "active",
        Filter::new()
            .where_(Where::new().eq("active", 1), Joiner::And, Joiner::And)
            .order_by("name", Direction::Asc, false),
    )
    .add_transformation("upper", |mut r: Record| {
        if let Some(Value::Text(name)) = r.get_mut("name") {
            *name = name.to_uppercase();
        }
        r
    });
    bp.source().start();
    bp
}

fn last_sql(bp: &Blueprint<RecordingSource<Canned>>) -> String {
    bp.source()
        .recorded()
        .last()
        .map(|s| s.sql.clone())
        .unwrap_or_default()
}

#[tokio::test]
async fn many_applies_pattern_filter_and_transformation() {
    let mut bp = users(Canned::mysql(vec![
        row(&[("id", Value::Int(1)), ("name", Value::from("ada"))]),
        row(&[("id", Value::Int(2)), ("name", Value::from("bob"))]),
    ]));

    let rows = bp
        .select()
        .with_pattern("users")
        .unwrap()
        .with_filter("active")
        .unwrap()
        .with_transformation("upper")
        .unwrap()
        .limit(10, 0)
        .many()
        .await
        .unwrap();

    assert_eq!(rows[0]["name"], Value::from("ADA"));
    assert_eq!(rows[1]["name"], Value::from("BOB"));
    assert_eq!(
        last_sql(&bp),
        "SELECT `users`.`id`, `users`.`name` FROM `users` WHERE (`users`.`active` = :wh0) \
         ORDER BY `users`.`name` ASC LIMIT 0, 10 "
    );
}

#[tokio::test]
async fn one_returns_first_row() {
    let mut bp = users(Canned::mysql(vec![
        row(&[("id", Value::Int(1)), ("name", Value::from("ada"))]),
        row(&[("id", Value::Int(2)), ("name", Value::from("bob"))]),
    ]));

    let first = bp.select().with_pattern("users").unwrap().one().await.unwrap();
    assert_eq!(first.unwrap()["id"], Value::Int(1));

    let mut empty = users(Canned::mysql(Vec::new()));
    let none = empty.select().with_pattern("users").unwrap().one().await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn terminal_without_pattern_is_configuration_error() {
    let mut bp = users(Canned::mysql(Vec::new()));
    let err = bp.select().many().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(bp.source().recorded().is_empty());
}

#[tokio::test]
async fn unknown_names_are_rejected() {
    let mut bp = users(Canned::mysql(Vec::new()));
    for err in [
        bp.with_pattern("nope").err(),
        bp.with_filter("nope").err(),
        bp.with_transformation("nope").err(),
    ] {
        assert!(matches!(
            err,
            Some(BlueprintError::NotRegistered { name, .. }) if name == "nope"
        ));
    }
}

#[tokio::test]
async fn active_elements_reset_after_terminal() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.select()
        .with_pattern("users")
        .unwrap()
        .with_filter("active")
        .unwrap()
        .many()
        .await
        .unwrap();

    // pattern, filter and statement type are gone
    assert!(bp.many().await.unwrap_err().is_configuration());

    bp.select().with_pattern("users").unwrap().many().await.unwrap();
    assert_eq!(
        last_sql(&bp),
        "SELECT `users`.`id`, `users`.`name` FROM `users` "
    );
}

#[tokio::test]
async fn state_resets_even_when_compile_fails() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.update().with_pattern("users").unwrap();
    // UPDATE without assignments
    assert!(bp.execute().await.unwrap_err().is_configuration());
    assert!(bp.compile().unwrap_err().is_configuration());
}

#[tokio::test]
async fn count_reads_count_column() {
    let mut bp = users(Canned::mysql(vec![row(&[("count", Value::Int(42))])]));
    let n = bp
        .with_pattern("users")
        .unwrap()
        .with_filter("active")
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(n, 42);
    assert!(last_sql(&bp).starts_with("SELECT `users`.`id`, `users`.`name` FROM `users` WHERE"));

    let mut bp = Blueprint::new(RecordingSource::new(Canned::mysql(vec![row(&[(
        "count",
        Value::Int(3),
    )])])));
    bp.add_pattern("all", Pattern::new().table("users"));
    bp.source().start();
    assert_eq!(bp.with_pattern("all").unwrap().count().await.unwrap(), 3);
    assert_eq!(last_sql(&bp), "SELECT COUNT(*) AS count FROM `users` ");
}

#[tokio::test]
async fn count_without_count_column_fails() {
    let mut bp = users(Canned::mysql(vec![row(&[("n", Value::Int(1))])]));
    let err = bp.with_pattern("users").unwrap().count().await.unwrap_err();
    assert!(matches!(err, BlueprintError::Decode { column, .. } if column == "count"));
}

#[tokio::test]
async fn count_without_row_is_not_found() {
    let mut bp = users(Canned::mysql(Vec::new()));
    let err = bp.with_pattern("users").unwrap().count().await.unwrap_err();
    assert!(err.is_not_found());
    // state was still cleared
    assert!(bp.query().statement_type().is_none());
}

#[tokio::test]
async fn table_overrides_pattern_table_for_one_interaction() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.select()
        .with_pattern("users")
        .unwrap()
        .table("archived_users")
        .unwrap()
        .many()
        .await
        .unwrap();
    assert_eq!(
        last_sql(&bp),
        "SELECT `archived_users`.`id`, `archived_users`.`name` FROM `archived_users` "
    );

    bp.select().with_pattern("users").unwrap().many().await.unwrap();
    assert_eq!(last_sql(&bp), "SELECT `users`.`id`, `users`.`name` FROM `users` ");
}

#[tokio::test]
async fn table_is_checked_against_whitelist() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.add_to_table_whitelist("users");
    assert!(bp.table("secrets").unwrap_err().is_whitelist());
    assert_eq!(bp.query().table(), None);
    assert!(bp.table(" ").is_err());
}

#[tokio::test]
async fn last_insert_id_comes_from_source() {
    let bp = Blueprint::new(Canned::mysql(Vec::new()));
    let err = bp.last_insert_id("users").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("users"));
}

#[tokio::test]
async fn update_payload_is_transformed_and_checked() {
    let mut bp = users(Canned {
        dialect: Dialect::Postgres,
        rows: Vec::new(),
        affected: 1,
    });

    let affected = bp
        .update()
        .with_pattern("users")
        .unwrap()
        .with_transformation("upper")
        .unwrap()
        .set([("name", "ada")])
        .where_(Where::new().eq("id", 7), Joiner::And, Joiner::And)
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let stmt = bp.source().recorded().pop().unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "users" SET "name" = :up0 WHERE ("users"."id" = :wh0) "#
    );
    assert_eq!(stmt.bindings[":up0"], Value::from("ADA"));
    assert_eq!(stmt.bindings[":wh0"], Value::Int(7));

    let err = bp
        .update()
        .with_pattern("users")
        .unwrap()
        .set([("password", "x")])
        .execute()
        .await
        .unwrap_err();
    assert!(err.is_pattern_mismatch());
}

#[tokio::test]
async fn insert_records_are_bound_in_column_order() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.insert()
        .with_pattern("users")
        .unwrap()
        .add([("id", Value::Int(1)), ("name", Value::from("a"))])
        .add([("name", Value::from("b")), ("id", Value::Int(2))])
        .execute()
        .await
        .unwrap();

    let stmt = bp.source().recorded().pop().unwrap();
    assert_eq!(
        stmt.sql,
        "INSERT INTO `users` (`users`.`id`, `users`.`name` ) VALUES (:ins0, :ins1), (:ins2, :ins3) "
    );
    assert_eq!(stmt.bindings[":ins2"], Value::Int(2));
    assert_eq!(stmt.bindings[":ins3"], Value::from("b"));
}

#[tokio::test]
async fn ad_hoc_clauses_compose_with_pattern() {
    let mut bp = Blueprint::new(Canned::mysql(Vec::new()));
    bp.add_pattern(
        "orders",
        Pattern::new()
            .table("orders")
            .aggregate(AggregateFunction::Sum, Shorthand::keyed([("total", "amount")]))
            .group_by("customer_id"),
    );

    bp.select()
        .with_pattern("orders")
        .unwrap()
        .columns("customer_id")
        .unwrap()
        .join("orders", "customers", [("customer_id", "id")], JoinKind::Inner)
        .unwrap()
        .order_by("total", Direction::Desc, true)
        .unwrap();

    let compiled = bp.compile().unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT `orders`.`customer_id`, SUM(`orders`.`amount`) AS `total` FROM `orders` \
         INNER JOIN `customers` ON `orders`.`customer_id` = `customers`.`id` \
         GROUP BY `orders`.`customer_id` ORDER BY `total` DESC "
    );
    // compile() leaves everything in place
    assert_eq!(bp.compile().unwrap(), compiled);
}

#[tokio::test]
async fn whitelist_survives_terminals() {
    let mut bp = users(Canned::mysql(Vec::new()));
    bp.add_to_table_whitelist(["users"]);
    bp.add_pattern("secrets", Pattern::new().table("secrets"));

    bp.select().with_pattern("users").unwrap().many().await.unwrap();
    let err = bp
        .select()
        .with_pattern("secrets")
        .unwrap()
        .many()
        .await
        .unwrap_err();
    assert!(err.is_whitelist());
}

#[tokio::test]
async fn batch_transformation_sees_whole_result_set() {
    let mut bp = users(Canned::mysql(vec![
        row(&[("id", Value::Int(5))]),
        row(&[("id", Value::Int(9))]),
    ]));
    bp.add_batch_transformation("index", |records: Vec<Record>| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.insert("current_index".into(), Value::from(i as i64));
                r
            })
            .collect()
    });

    let rows = bp
        .select()
        .with_pattern("users")
        .unwrap()
        .with_transformation("index")
        .unwrap()
        .many()
        .await
        .unwrap();
    assert_eq!(rows[1]["current_index"], Value::Int(1));

    // applied to INSERT payloads before binding
    bp.insert()
        .with_pattern("users")
        .unwrap()
        .with_transformation("index")
        .unwrap()
        .add([("id", Value::Int(1))])
        .add([("id", Value::Int(2))]);
    let err = bp.execute().await.unwrap_err();
    // current_index is outside the pattern's columns
    assert!(err.is_pattern_mismatch());
}
