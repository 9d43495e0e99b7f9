use thunktrace::domain::event::{
    ArgumentBinding, BindingKind, CallEntryEvent, CallExitEvent, FunctionDecl, ValueSnapshot,
};
use thunktrace::domain::fingerprint::{Dispatch, RETURN_SLOT};
use thunktrace::domain::function::FunctionKind;
use thunktrace::domain::tracer::{TracerConfig, TracerState};
use thunktrace::ports::trace_exporter::CsvTraceExporter;

fn snapshot(kind: &str) -> ValueSnapshot {
    ValueSnapshot {
        kind: kind.to_string(),
        tags: vec![],
        classes: vec![],
        attr_names: vec![],
        value_id: None,
    }
}

fn f_decl() -> FunctionDecl {
    FunctionDecl {
        handle: 1,
        name: "f".to_string(),
        package: "testpkg".to_string(),
        definition: "function(x, y) x + 1".to_string(),
        kind: FunctionKind::Closure,
        formal_parameter_count: 2,
    }
}

/// One call `f(x = 1, y = missing)` returning a double: the argument `x` is a
/// promise forced to a double, `y` is never bound.
fn run_f_once(state: &mut TracerState, promise_id: u64) {
    state.handle(&thunktrace::domain::event::TraceEvent::CallEntry(
        CallEntryEvent {
            function: f_decl(),
            dispatch: Dispatch::None,
            environment: 10,
            arguments: vec![
                ArgumentBinding {
                    name: Some("x".to_string()),
                    formal_position: 0,
                    actual_position: 0,
                    dots: false,
                    binding: BindingKind::Promise {
                        promise_id,
                        environment: 9,
                        value: None,
                        expression: Some(snapshot("double")),
                    },
                },
                ArgumentBinding {
                    name: Some("y".to_string()),
                    formal_position: 1,
                    actual_position: 1,
                    dots: false,
                    binding: BindingKind::Missing,
                },
            ],
            eval_order: None,
        },
    ));
    state.handle(&thunktrace::domain::event::TraceEvent::CallExit(
        CallExitEvent {
            return_value: Some(snapshot("double")),
        },
    ));
}

#[test]
fn repeated_identical_calls_share_one_catalogue_row() {
    let mut state = TracerState::new(TracerConfig::default());
    run_f_once(&mut state, 100);

    assert_eq!(state.catalogue().len(), 1);
    let entries = state.catalogue().sorted_entries();
    assert_eq!(entries[0].count, 1);
    assert_eq!(entries[0].fingerprint.slot(0).unwrap().kind(), "double");
    assert_eq!(entries[0].fingerprint.slot(1).unwrap().kind(), "missing");
    assert_eq!(
        entries[0].fingerprint.slot(RETURN_SLOT).unwrap().kind(),
        "double"
    );

    // An identical call increments the count and adds no row.
    run_f_once(&mut state, 101);
    assert_eq!(state.catalogue().len(), 1);
    assert_eq!(state.catalogue().sorted_entries()[0].count, 2);
}

#[test]
fn csv_export_renders_one_row_with_shape_triples() {
    let mut state = TracerState::new(TracerConfig::default());
    run_f_once(&mut state, 100);
    run_f_once(&mut state, 101);

    let csv = CsvTraceExporter::to_csv(state.catalogue(), "testpkg");
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("package_being_analyzed,package,fun_name,fun_id,"));
    assert!(header.contains("arg_t_r,arg_c_r,arg_a_r"));
    assert!(header.ends_with("arg_t1,arg_c1,arg_a1"));

    let row = lines.next().unwrap();
    assert!(row.starts_with("testpkg,testpkg,f,\""));
    assert!(row.contains(",2,")); // count
    assert!(row.contains("\"double\""));
    assert!(row.contains("\"missing\""));
    assert!(lines.next().is_none());
}

#[test]
fn builtin_arguments_are_recorded_eagerly_at_entry() {
    let snap_id = |kind: &str, id: u64| ValueSnapshot {
        kind: kind.to_string(),
        tags: vec![],
        classes: vec![],
        attr_names: vec![],
        value_id: Some(id),
    };
    let binding = |pos: i32, kind: BindingKind| ArgumentBinding {
        name: None,
        formal_position: pos,
        actual_position: pos,
        dots: false,
        binding: kind,
    };

    let mut state = TracerState::new(TracerConfig::default());
    state.handle(&thunktrace::domain::event::TraceEvent::CallEntry(
        CallEntryEvent {
            function: FunctionDecl {
                handle: 5,
                name: "sum".to_string(),
                package: "base".to_string(),
                definition: "sum".to_string(),
                kind: FunctionKind::Builtin,
                formal_parameter_count: 4,
            },
            dispatch: Dispatch::None,
            environment: 10,
            arguments: vec![
                binding(
                    0,
                    BindingKind::Value {
                        value: snap_id("double", 40),
                    },
                ),
                // A pre-existing promise reaching a builtin, already forced.
                binding(
                    1,
                    BindingKind::Promise {
                        promise_id: 70,
                        environment: 10,
                        value: Some(snap_id("integer", 41)),
                        expression: None,
                    },
                ),
                binding(2, BindingKind::Missing),
                // An unforced promise contributes nothing but the sentinel.
                binding(
                    3,
                    BindingKind::Promise {
                        promise_id: 71,
                        environment: 10,
                        value: None,
                        expression: None,
                    },
                ),
            ],
            eval_order: Some(7),
        },
    ));
    state.handle(&thunktrace::domain::event::TraceEvent::CallExit(
        CallExitEvent {
            return_value: Some(snap_id("double", 42)),
        },
    ));

    assert_eq!(state.catalogue().len(), 1);
    let entries = state.catalogue().sorted_entries();
    let fp = &entries[0].fingerprint;
    assert_eq!(fp.slot(0).unwrap().kind(), "double");
    assert_eq!(fp.slot(1).unwrap().kind(), "integer");
    assert_eq!(fp.slot(2).unwrap().kind(), "missing");
    assert_eq!(fp.slot(3).unwrap().kind(), "missing");
    assert_eq!(fp.slot(RETURN_SLOT).unwrap().kind(), "double");

    // The builtin's return value flows onward like any closure's.
    state.handle(&thunktrace::domain::event::TraceEvent::CallEntry(
        CallEntryEvent {
            function: f_decl(),
            dispatch: Dispatch::None,
            environment: 11,
            arguments: vec![binding(
                0,
                BindingKind::Value {
                    value: snap_id("double", 42),
                },
            )],
            eval_order: None,
        },
    ));
    assert_eq!(state.dependencies().edge_count(), 1);
}

#[test]
fn different_argument_shapes_produce_distinct_rows() {
    let mut state = TracerState::new(TracerConfig::default());
    run_f_once(&mut state, 100);

    // Same function, but `x` forced to a character this time.
    state.handle(&thunktrace::domain::event::TraceEvent::CallEntry(
        CallEntryEvent {
            function: f_decl(),
            dispatch: Dispatch::None,
            environment: 10,
            arguments: vec![ArgumentBinding {
                name: Some("x".to_string()),
                formal_position: 0,
                actual_position: 0,
                dots: false,
                binding: BindingKind::Value {
                    value: snapshot("character"),
                },
            }],
            eval_order: None,
        },
    ));
    state.handle(&thunktrace::domain::event::TraceEvent::CallExit(
        CallExitEvent {
            return_value: Some(snapshot("character")),
        },
    ));

    assert_eq!(state.catalogue().len(), 2);
}
