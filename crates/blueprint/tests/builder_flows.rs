use blueprint::query::Bindings;
use blueprint::{
    AggregateFunction, Blueprint, BlueprintResult, Dialect, Direction, Filter, JoinKind, Joiner,
    Pattern, Record, RecordingSource, Shorthand, Source, Value, Where,
};

struct MockSource {
    dialect: Dialect,
    rows: Vec<Record>,
}

impl Source for MockSource {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn fetch_all(&self, _: &str, _: &Bindings) -> BlueprintResult<Vec<Record>> {
        Ok(self.rows.clone())
    }

    async fn execute(&self, _: &str, _: &Bindings) -> BlueprintResult<u64> {
        Ok(1)
    }
}

fn mock_rows() -> Vec<Record> {
    (0..5)
        .map(|i| {
            let mut r = Record::new();
            r.insert("id".into(), Value::Int(i));
            r.insert("created".into(), Value::Int(1_484_784_000));
            r.insert("firstcolumn".into(), Value::Text(format!("firstcolumn{i}")));
            r
        })
        .collect()
}

fn created_to_date(mut record: Record) -> Record {
    if let Some(Value::Int(ts)) = record.get("created") {
        let date = chrono::DateTime::from_timestamp(*ts, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        record.insert("created".into(), Value::Text(date));
    }
    record
}

fn date_to_created(mut record: Record) -> Record {
    if let Some(Value::Text(date)) = record.get("created") {
        let ts = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc().timestamp())
            .unwrap_or_default();
        record.insert("created".into(), Value::Int(ts));
    }
    record
}

fn mock_blueprint(rows: Vec<Record>) -> Blueprint<RecordingSource<MockSource>> {
    let mut bp = Blueprint::new(RecordingSource::new(MockSource {
        dialect: Dialect::MySql,
        rows,
    }));
    bp.add_pattern(
        "whole",
        Pattern::new()
            .table("mockTable")
            .join("mockTable", "joinTable", [("id", "join_id")], JoinKind::Left)
            .columns(Shorthand::tables([
                ("mockTable", Shorthand::from("*")),
                ("joinTable", Shorthand::from(["firstcolumn", "secondcolumn"])),
            ]))
            .aggregate(AggregateFunction::Sum, "col2")
            .group_by("col1"),
    )
    .add_pattern(
        "insert",
        Pattern::new()
            .table("mockTable")
            .columns(["created", "col1", "col2", "current_index"]),
    )
    .add_filter(
        "activeOnly",
        Filter::new()
            .where_(Where::new().key("created >", 1_484_700_000), Joiner::And, Joiner::And)
            .order_by("created", Direction::Desc, true)
            .limit(10, 50),
    )
    .add_transformation("createdTimestampToString", created_to_date)
    .add_transformation("createdStringToTimestamp", date_to_created);
    bp.source().start();
    bp
}

#[tokio::test]
async fn select_many_with_transformation() {
    let mut bp = mock_blueprint(mock_rows());
    let rows = bp
        .select()
        .with_pattern("whole")
        .unwrap()
        .with_transformation("createdTimestampToString")
        .unwrap()
        .order_by("col1", Direction::Asc, false)
        .unwrap()
        .limit(5, 0)
        .many()
        .await
        .unwrap();

    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r["created"] == Value::from("2017-01-19")));

    let recorded = bp.source().recorded();
    assert_eq!(
        recorded[0].sql,
        "SELECT `mockTable`.*, `joinTable`.`firstcolumn`, `joinTable`.`secondcolumn`, \
         SUM(`mockTable`.`col2`) AS `col2` FROM `mockTable` \
         LEFT JOIN `joinTable` ON `mockTable`.`id` = `joinTable`.`join_id` \
         GROUP BY `mockTable`.`col1` ORDER BY `mockTable`.`col1` ASC LIMIT 0, 5 "
    );
    assert!(recorded[0].bindings.is_empty());
}

#[tokio::test]
async fn select_with_filter() {
    let mut bp = mock_blueprint(mock_rows());
    bp.select()
        .with_pattern("whole")
        .unwrap()
        .with_filter("activeOnly")
        .unwrap()
        .many()
        .await
        .unwrap();

    let stmt = &bp.source().recorded()[0];
    assert!(stmt.sql.ends_with(
        "WHERE (`mockTable`.`created` > :wh0) GROUP BY `mockTable`.`col1` \
         ORDER BY `created` DESC LIMIT 50, 10 "
    ));
    assert_eq!(stmt.bindings[":wh0"], Value::Int(1_484_700_000));
}

#[tokio::test]
async fn ad_hoc_select_matches_pattern_style_output() {
    let mut bp = mock_blueprint(Vec::new());
    bp.add_pattern("table", Pattern::new().table("mockTable"));

    let compiled = bp
        .select()
        .with_pattern("table")
        .unwrap()
        .join("mockTable", "joinTable", [("id", "join_id")], JoinKind::Left)
        .unwrap()
        .columns(Shorthand::tables([
            ("mockTable", Shorthand::from("*")),
            (
                "joinTable",
                Shorthand::keyed([("alias1", "firstcolumn"), ("alias2", "secondcolumn")]),
            ),
        ]))
        .unwrap()
        .where_(
            Where::new().on("mockTable", |w| w.key("id >", 0)),
            Joiner::And,
            Joiner::And,
        )
        .unwrap()
        .group_by(Shorthand::keyed([("mockTable", "col1")]))
        .unwrap()
        .order_by(Shorthand::tables([("mockTable", ["id"])]), Direction::Desc, false)
        .unwrap()
        .limit(5, 0)
        .compile()
        .unwrap();

    assert_eq!(
        compiled.sql,
        "SELECT `mockTable`.*, `joinTable`.`firstcolumn` AS `alias1`, \
         `joinTable`.`secondcolumn` AS `alias2` FROM `mockTable` \
         LEFT JOIN `joinTable` ON `mockTable`.`id` = `joinTable`.`join_id` \
         WHERE (`mockTable`.`id` > :wh0) GROUP BY `mockTable`.`col1` \
         ORDER BY `mockTable`.`id` DESC LIMIT 0, 5 "
    );
    assert_eq!(compiled.bindings[":wh0"], Value::Int(0));
}

#[tokio::test]
async fn insert_applies_transformations_before_binding() {
    let mut bp = mock_blueprint(Vec::new());
    let affected = bp
        .insert()
        .with_pattern("insert")
        .unwrap()
        .with_transformation("createdStringToTimestamp")
        .unwrap()
        .add([
            ("created", "2017-01-19"),
            ("col1", "firstcolumn"),
            ("col2", "secondcolumn"),
        ])
        .execute()
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let stmt = &bp.source().recorded()[0];
    assert_eq!(
        stmt.sql,
        "INSERT INTO `mockTable` (`mockTable`.`created`, `mockTable`.`col1`, `mockTable`.`col2` ) \
         VALUES (:ins0, :ins1, :ins2) "
    );
    assert_eq!(stmt.bindings[":ins0"], Value::Int(1_484_784_000));
    assert_eq!(stmt.bindings[":ins1"], Value::from("firstcolumn"));
    assert_eq!(stmt.error, None);
}

#[tokio::test]
async fn update_and_delete_statements() {
    let mut bp = mock_blueprint(Vec::new());
    bp.add_pattern(
        "update",
        Pattern::new()
            .table("mockTable")
            .columns(["created", "col1", "col2", "current_index"]),
    );

    bp.update()
        .with_pattern("update")
        .unwrap()
        .with_transformation("createdStringToTimestamp")
        .unwrap()
        .set([
            ("created", "2017-01-19"),
            ("col1", "firstcolumn"),
            ("col2", "secondcolumn"),
        ])
        .where_(Where::new().eq("id", 1), Joiner::And, Joiner::And)
        .unwrap()
        .execute()
        .await
        .unwrap();

    bp.delete()
        .with_pattern("update")
        .unwrap()
        .where_(Where::new().eq("id", 1), Joiner::And, Joiner::And)
        .unwrap()
        .execute()
        .await
        .unwrap();

    let recorded = bp.source().recorded();
    assert_eq!(
        recorded[0].sql,
        "UPDATE `mockTable` SET `created` = :up0, `col1` = :up1, `col2` = :up2 \
         WHERE (`mockTable`.`id` = :wh0) "
    );
    assert_eq!(recorded[0].bindings[":up0"], Value::Int(1_484_784_000));
    assert_eq!(recorded[0].bindings[":wh0"], Value::Int(1));
    assert_eq!(
        recorded[1].sql,
        "DELETE FROM `mockTable` WHERE (`mockTable`.`id` = :wh0) "
    );
}

#[tokio::test]
async fn count_query() {
    let mut count_row = Record::new();
    count_row.insert("count".into(), Value::Int(12));
    let mut bp = mock_blueprint(vec![count_row]);
    bp.add_pattern("table", Pattern::new().table("mockTable"));

    let n = bp
        .with_pattern("table")
        .unwrap()
        .where_(Where::new().key("id >", 1), Joiner::And, Joiner::And)
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(n, 12);
    assert_eq!(
        bp.source().recorded()[0].sql,
        "SELECT COUNT(*) AS count FROM `mockTable` WHERE (`mockTable`.`id` > :wh0) "
    );
}

#[tokio::test]
async fn unknown_elements_fail() {
    let mut bp = mock_blueprint(Vec::new());
    assert!(bp.with_pattern("fake").is_err());
    assert!(bp.with_filter("fake").is_err());
    assert!(bp.with_transformation("fake").is_err());
    assert!(bp.select().many().await.unwrap_err().is_configuration());
}
