//! End-to-end filter compilation: expression trees in, predicates out,
//! verified by evaluating the predicates against a small entity graph.

use sentra::model::EntityType;
use sentra::predicate::{CmpOp, NumberExpr, Predicate, RelationTarget};
use sentra::query::ast::{BinaryOp, Expr};
use sentra::query::{FilterCompiler, SpecRegistry};
use sentra::store::{EntityRow, InMemoryStore, Page, Repository};
use sentra::types::EntityId;
use sentra::value::Value;
use time::macros::datetime;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two stations; station-a carries two datastreams, one of which holds three
/// observations, station-b a single remote datastream with one low reading.
fn fixture() -> InMemoryStore {
    let mut store = InMemoryStore::new();

    store.insert(
        EntityType::Thing,
        EntityRow::new(1)
            .set("name", "station-a")
            .set("description", "rooftop station"),
    );
    store.insert(EntityType::Thing, EntityRow::new(2).set("name", "station-b"));

    store.insert(EntityType::Sensor, EntityRow::new(20).set("name", "dht22"));
    store.insert(EntityType::Sensor, EntityRow::new(21).set("name", "sds011"));
    store.insert(
        EntityType::ObservedProperty,
        EntityRow::new(25).set("name", "temperature"),
    );

    store.insert(
        EntityType::Datastream,
        EntityRow::new(10).set("name", "air-temp").set(
            "phenomenonTime",
            Value::Range {
                start: datetime!(2023-01-01 00:00:00 UTC),
                end: datetime!(2023-12-31 00:00:00 UTC),
            },
        ),
    );
    store.insert(
        EntityType::Datastream,
        EntityRow::new(11).set("name", "humidity"),
    );
    store.insert(
        EntityType::Datastream,
        EntityRow::new(12).set("name", "remote"),
    );

    store.insert(
        EntityType::Observation,
        EntityRow::new(100)
            .set("result", 18.5)
            .set(
                "phenomenonTime",
                Value::Instant(datetime!(2023-06-15 12:30:45 UTC)),
            ),
    );
    store.insert(
        EntityType::Observation,
        EntityRow::new(101).set("result", 21.0),
    );
    store.insert(
        EntityType::Observation,
        EntityRow::new(102).set("result", 23.5),
    );
    store.insert(
        EntityType::Observation,
        EntityRow::new(110).set("result", 5.0),
    );

    for (id, thing) in [(10, 1), (11, 1), (12, 2)] {
        store
            .link(EntityType::Datastream, EntityId(id), "Thing", EntityId(thing))
            .unwrap();
    }
    store
        .link(EntityType::Datastream, EntityId(10), "Sensor", EntityId(20))
        .unwrap();
    store
        .link(EntityType::Datastream, EntityId(11), "Sensor", EntityId(21))
        .unwrap();
    store
        .link(EntityType::Datastream, EntityId(12), "Sensor", EntityId(21))
        .unwrap();
    for id in [10, 11, 12] {
        store
            .link(
                EntityType::Datastream,
                EntityId(id),
                "ObservedProperty",
                EntityId(25),
            )
            .unwrap();
    }
    for obs in [100, 101, 102] {
        store
            .link(
                EntityType::Observation,
                EntityId(obs),
                "Datastream",
                EntityId(10),
            )
            .unwrap();
    }
    store
        .link(
            EntityType::Observation,
            EntityId(110),
            "Datastream",
            EntityId(12),
        )
        .unwrap();

    store
}

fn ids(store: &InMemoryStore, entity: EntityType, pred: &Predicate) -> Vec<u64> {
    store
        .find_all(entity, pred, Page::ALL)
        .unwrap()
        .into_iter()
        .map(u64::from)
        .collect()
}

fn compile(root: EntityType, expr: &Expr) -> Result<Predicate, sentra::query::QueryError> {
    init_tracing();
    let registry = SpecRegistry::new();
    FilterCompiler::new(&registry, root).compile(expr)
}

#[test]
fn numeric_comparison_selects_matching_rows() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Gt,
        Expr::member(["result"]),
        Expr::literal("20"),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![101, 102]);
}

#[test]
fn string_comparison_falls_through_numeric_stage() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["name"]),
        Expr::literal("'station-a'"),
    );
    let pred = compile(EntityType::Thing, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![1]);
}

#[test]
fn switched_literal_mirrors_ordering() {
    let store = fixture();
    // 20 lt result  ≡  result gt 20
    let expr = Expr::binary(
        BinaryOp::Lt,
        Expr::literal("20"),
        Expr::member(["result"]),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![101, 102]);
}

#[test]
fn arithmetic_inside_comparison() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Ge,
        Expr::binary(
            BinaryOp::Add,
            Expr::member(["result"]),
            Expr::literal("1"),
        ),
        Expr::literal("22"),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![101, 102]);
}

#[test]
fn boolean_connectives_compose() {
    let store = fixture();
    let gt_20 = Expr::binary(BinaryOp::Gt, Expr::member(["result"]), Expr::literal("20"));
    let lt_23 = Expr::binary(BinaryOp::Lt, Expr::member(["result"]), Expr::literal("23"));
    let both = Expr::binary(BinaryOp::And, gt_20.clone(), lt_23.clone());
    let pred = compile(EntityType::Observation, &both).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![101]);

    let either = Expr::binary(BinaryOp::Or, gt_20.clone(), lt_23);
    let pred = compile(EntityType::Observation, &either).unwrap();
    assert_eq!(
        ids(&store, EntityType::Observation, &pred),
        vec![100, 101, 102, 110]
    );

    let neither = Expr::not(gt_20);
    let pred = compile(EntityType::Observation, &neither).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![100, 110]);
}

#[test]
fn unary_minus_folds_into_literal() {
    let expr = Expr::binary(
        BinaryOp::Lt,
        Expr::member(["result"]),
        Expr::neg(Expr::literal("3")),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(
        pred,
        Predicate::NumberCmp {
            op: CmpOp::Lt,
            lhs: NumberExpr::Property("result".into()),
            rhs: NumberExpr::Literal(-3.0),
        }
    );
}

#[test]
fn foreign_path_folds_into_subquery() {
    let store = fixture();
    // Datastreams whose observations include a result above 20.
    let expr = Expr::binary(
        BinaryOp::Ge,
        Expr::member(["Observations", "result"]),
        Expr::literal("20"),
    );
    let pred = compile(EntityType::Datastream, &expr).unwrap();
    match &pred {
        Predicate::Related {
            relation,
            target: RelationTarget::In(sub),
        } => {
            assert_eq!(relation, "Observations");
            assert_eq!(sub.entity, EntityType::Observation);
        }
        other => panic!("expected folded relationship predicate, got {other:?}"),
    }
    assert_eq!(ids(&store, EntityType::Datastream, &pred), vec![10]);
}

#[test]
fn two_hop_path_folds_outward() {
    let store = fixture();
    // Sensors with a datastream carrying a result above 20.
    let expr = Expr::binary(
        BinaryOp::Gt,
        Expr::member(["Datastreams", "Observations", "result"]),
        Expr::literal("20"),
    );
    let pred = compile(EntityType::Sensor, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Sensor, &pred), vec![20]);
}

#[test]
fn switched_foreign_path_mirrors_ordering() {
    let store = fixture();
    // 20 le Observations/result  ≡  Observations/result ge 20
    let expr = Expr::binary(
        BinaryOp::Le,
        Expr::literal("20"),
        Expr::member(["Observations", "result"]),
    );
    let pred = compile(EntityType::Datastream, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Datastream, &pred), vec![10]);
}

#[test]
fn folding_resolves_terminal_name_on_deepest_entity() {
    let store = fixture();
    // "name" exists on both Datastream and Sensor; the path scopes it to
    // Sensor.
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["Sensor", "name"]),
        Expr::literal("'sds011'"),
    );
    let pred = compile(EntityType::Datastream, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Datastream, &pred), vec![11, 12]);
}

#[test]
fn two_paths_cannot_be_compared() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["Observations", "result"]),
        Expr::member(["Thing", "name"]),
    );
    let err = compile(EntityType::Datastream, &expr).unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");
}

#[test]
fn path_compared_to_expression_is_rejected() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["Observations", "result"]),
        Expr::binary(BinaryOp::Add, Expr::literal("1"), Expr::literal("2")),
    );
    let err = compile(EntityType::Datastream, &expr).unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");
}

#[test]
fn primitive_property_cannot_be_a_hop() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["name", "result"]),
        Expr::literal("1"),
    );
    let err = compile(EntityType::Datastream, &expr).unwrap_err();
    assert_eq!(err.code(), "UnsupportedPathShape");
}

#[test]
fn unknown_hop_names_the_entity() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["Widgets", "result"]),
        Expr::literal("1"),
    );
    let err = compile(EntityType::Datastream, &expr).unwrap_err();
    assert_eq!(err.code(), "UnknownProperty");
}

#[test]
fn exhausted_chain_reports_every_stage() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::literal("'abc'"),
        Expr::literal("2023-06-15T00:00:00Z"),
    );
    let err = compile(EntityType::Observation, &expr).unwrap_err();
    match err {
        sentra::query::QueryError::TypeCoercionFailure { stages, .. } => {
            let names: Vec<_> = stages.iter().map(|s| s.stage).collect();
            assert_eq!(
                names,
                vec!["numeric", "string", "navigation", "instant", "range"]
            );
        }
        other => panic!("expected coercion failure, got {other:?}"),
    }
}

#[test]
fn range_equality_compiles_but_ordering_does_not() {
    let store = fixture();
    let range = "2023-01-01T00:00:00Z/2023-12-31T00:00:00Z";
    let eq = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["phenomenonTime"]),
        Expr::literal(range),
    );
    let pred = compile(EntityType::Datastream, &eq).unwrap();
    assert_eq!(ids(&store, EntityType::Datastream, &pred), vec![10]);

    let gt = Expr::binary(
        BinaryOp::Gt,
        Expr::member(["phenomenonTime"]),
        Expr::literal(range),
    );
    let err = compile(EntityType::Datastream, &gt).unwrap_err();
    assert_eq!(err.code(), "UnsupportedOperator");
}

#[test]
fn instant_comparison_reaches_time_stage() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Lt,
        Expr::member(["phenomenonTime"]),
        Expr::literal("2024-01-01T00:00:00Z"),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    // Only observation 100 stores a phenomenonTime.
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![100]);
}

#[test]
fn string_functions_compile_and_evaluate() {
    let store = fixture();

    let contains = Expr::call(
        "contains",
        [Expr::member(["name"]), Expr::literal("'station'")],
    );
    let pred = compile(EntityType::Thing, &contains).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![1, 2]);

    let ends = Expr::call(
        "endswith",
        [Expr::member(["name"]), Expr::literal("'-b'")],
    );
    let pred = compile(EntityType::Thing, &ends).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![2]);

    let upper = Expr::binary(
        BinaryOp::Eq,
        Expr::call("toupper", [Expr::member(["name"])]),
        Expr::literal("'STATION-A'"),
    );
    let pred = compile(EntityType::Thing, &upper).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![1]);

    let length = Expr::binary(
        BinaryOp::Eq,
        Expr::call("length", [Expr::member(["name"])]),
        Expr::literal("9"),
    );
    let pred = compile(EntityType::Thing, &length).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![1, 2]);

    let sliced = Expr::binary(
        BinaryOp::Eq,
        Expr::call(
            "substring",
            [
                Expr::member(["name"]),
                Expr::literal("8"),
            ],
        ),
        Expr::literal("'a'"),
    );
    let pred = compile(EntityType::Thing, &sliced).unwrap();
    assert_eq!(ids(&store, EntityType::Thing, &pred), vec![1]);
}

#[test]
fn date_part_functions_compile_and_evaluate() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::call("year", [Expr::member(["phenomenonTime"])]),
        Expr::literal("2023"),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![100]);
}

#[test]
fn rounding_functions_compile_and_evaluate() {
    let store = fixture();
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::call("floor", [Expr::member(["result"])]),
        Expr::literal("21"),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    assert_eq!(ids(&store, EntityType::Observation, &pred), vec![101]);
}

#[test]
fn now_is_captured_once_per_compilation() {
    // Both now() calls in one filter must resolve to the same instant.
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::call("now", []),
        Expr::call("now", []),
    );
    let pred = compile(EntityType::Observation, &expr).unwrap();
    match pred {
        Predicate::TimeCmp { op: CmpOp::Eq, lhs, rhs } => assert_eq!(lhs, rhs),
        other => panic!("expected an instant comparison, got {other:?}"),
    }
}

#[test]
fn unwired_protocol_function_is_unsupported() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::call("date", [Expr::member(["phenomenonTime"])]),
        Expr::literal("1"),
    );
    let err = compile(EntityType::Observation, &expr).unwrap_err();
    assert_eq!(err.code(), "UnsupportedOperator");
}

#[test]
fn unknown_function_is_rejected() {
    let expr = Expr::call("frobnicate", [Expr::member(["result"])]);
    let err = compile(EntityType::Observation, &expr).unwrap_err();
    assert_eq!(err.code(), "UnsupportedOperator");
}

#[test]
fn function_arity_is_checked() {
    let expr = Expr::call("contains", [Expr::member(["name"])]);
    let err = compile(EntityType::Thing, &expr).unwrap_err();
    assert_eq!(err.code(), "InvalidOperand");
}

#[test]
fn non_boolean_result_is_rejected() {
    let err = compile(EntityType::Observation, &Expr::member(["result"])).unwrap_err();
    assert_eq!(err.code(), "InvalidOperand");
}

#[test]
fn not_requires_a_predicate() {
    let err = compile(EntityType::Observation, &Expr::not(Expr::literal("1"))).unwrap_err();
    assert_eq!(err.code(), "InvalidOperand");
}

#[test]
fn bad_literal_fails_at_decode() {
    let expr = Expr::binary(
        BinaryOp::Eq,
        Expr::member(["result"]),
        Expr::literal("notanumber"),
    );
    let err = compile(EntityType::Observation, &expr).unwrap_err();
    assert_eq!(err.code(), "InvalidLiteral");
}
