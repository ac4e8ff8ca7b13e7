//! Integration tests for declaring, registering and instantiating classes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use horizon_trellis::platform::{
    Accessor, ActionMap, ClassTreeDebug, CoreError, Instance, MainLoop, TreeFormatOptions,
    TypeFlags, TypeRegistry, Value, ValueKind,
};
use parking_lot::Mutex;
use horizon_trellis::{
    ActionDescriptor, BoxError, ClassBuilder, ConstructArgs, Error, PropertyDescriptor,
    PropertyFlags, SignalDescriptor, Template,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn stored(property: &'static str) -> Accessor {
    Accessor::new(
        move |instance| instance.stored_value(property),
        move |instance, value| instance.store_value(property, value),
    )
}

#[test]
fn numeric_writes_are_truncated_and_clamped() {
    init_tracing();
    let registry = TypeRegistry::new();
    let template = Template::builder(&registry.widget_class())
        .property("level", PropertyDescriptor::int32().with_range(0.0, 10.0))
        .property("count", PropertyDescriptor::uint32().with_max(5.0))
        .property("ratio", PropertyDescriptor::double().with_range(-1.0, 1.0))
        .build();
    let class = ClassBuilder::new("Gauge", template)
        .accessor("level", stored("level"))
        .accessor("count", stored("count"))
        .accessor("ratio", stored("ratio"))
        .register(&registry)
        .unwrap();
    let gauge = class.create(&MainLoop::new()).unwrap();

    gauge.set_property("level", 7.9).unwrap();
    assert_eq!(gauge.property("level").unwrap(), Value::Int(7));
    gauge.set_property("level", 99).unwrap();
    assert_eq!(gauge.property("level").unwrap(), Value::Int(10));

    gauge.set_property("count", -3).unwrap();
    assert_eq!(gauge.property("count").unwrap(), Value::UInt(0));
    gauge.set_property("count", 4.99).unwrap();
    assert_eq!(gauge.property("count").unwrap(), Value::UInt(4));

    gauge.set_property("ratio", 0.75).unwrap();
    assert_eq!(gauge.property("ratio").unwrap(), Value::Double(0.75));
    gauge.set_property("ratio", -8.5).unwrap();
    assert_eq!(gauge.property("ratio").unwrap(), Value::Double(-1.0));

    assert!(matches!(
        gauge.set_property("level", "high"),
        Err(CoreError::TypeMismatch { .. })
    ));
}

#[test]
fn flags_decide_readability_and_writability() {
    let registry = TypeRegistry::new();
    let template = Template::builder(&registry.object_class())
        .property(
            "version",
            PropertyDescriptor::int32()
                .with_default(7)
                .with_flags(PropertyFlags::Constant),
        )
        .property("name", PropertyDescriptor::string())
        .property(
            "mode",
            PropertyDescriptor::string()
                .with_default("auto")
                .with_flags(PropertyFlags::Construct),
        )
        .property(
            "id",
            PropertyDescriptor::uint32().with_flags(PropertyFlags::ConstructOnly),
        )
        .build();
    let class = ClassBuilder::new("Document", template)
        .accessor("name", stored("name"))
        .accessor("mode", stored("mode"))
        .register(&registry)
        .unwrap();

    let document = class
        .create_with(&MainLoop::new(), ConstructArgs::new().property("id", 12u32))
        .unwrap();

    assert_eq!(class.constant_value("version"), Some(Value::Int(7)));
    assert_eq!(document.property("version").unwrap(), Value::Int(7));
    assert!(matches!(
        document.set_property("version", 8),
        Err(CoreError::PropertyReadOnly { .. })
    ));

    document.set_property("name", "draft").unwrap();
    assert_eq!(document.property("name").unwrap(), Value::from("draft"));

    assert_eq!(document.property("mode").unwrap(), Value::from("auto"));
    document.set_property("mode", "manual").unwrap();
    assert_eq!(document.property("mode").unwrap(), Value::from("manual"));

    assert_eq!(document.property("id").unwrap(), Value::UInt(12));
    assert!(matches!(
        document.set_property("id", 13u32),
        Err(CoreError::ConstructOnly { .. })
    ));
}

#[test]
fn supplying_a_constant_fails_construction() {
    let registry = TypeRegistry::new();
    let class = ClassBuilder::without_template("Badge", &registry.object_class())
        .property(
            "kind",
            PropertyDescriptor::string()
                .with_default("info")
                .with_flags(PropertyFlags::Constant),
        )
        .register(&registry)
        .unwrap();

    let err = class
        .create_with(&MainLoop::new(), ConstructArgs::new().property("kind", "error"))
        .unwrap_err();
    assert!(matches!(err, Error::Platform(CoreError::PropertyReadOnly { .. })));
}

#[test]
fn missing_accessor_names_class_and_property() {
    let registry = TypeRegistry::new();
    let class = ClassBuilder::without_template("Counter", &registry.object_class())
        .property("count", PropertyDescriptor::int32())
        .register(&registry)
        .unwrap();

    let err = class.create(&MainLoop::new()).unwrap_err();
    assert_eq!(err, Error::accessor_contract("Counter", "count"));
    let message = err.to_string();
    assert!(message.contains("Counter") && message.contains("count"));
}

#[test]
fn instance_accessors_defined_during_init_are_accepted() {
    let registry = TypeRegistry::new();
    let class = ClassBuilder::without_template("Tally", &registry.object_class())
        .property("total", PropertyDescriptor::int32().with_range(0.0, 100.0))
        .on_init(|tally| tally.define_accessor("total", stored("total")))
        .register(&registry)
        .unwrap();

    let tally = class.create(&MainLoop::new()).unwrap();
    tally.set_property("total", 250).unwrap();
    assert_eq!(tally.property("total").unwrap(), Value::Int(100));
}

#[test]
fn signals_stay_with_the_class_that_declared_them() {
    let registry = TypeRegistry::new();
    let first = ClassBuilder::without_template("First", &registry.object_class())
        .signal("changed", SignalDescriptor::new().with_param_types([ValueKind::Int]))
        .register(&registry)
        .unwrap();
    let second = ClassBuilder::without_template("Second", &registry.object_class())
        .register(&registry)
        .unwrap();

    assert!(first.handle().find_signal("changed").is_some());
    assert!(second.handle().find_signal("changed").is_none());
    assert_eq!(second.handle().own_signals().count(), 0);
}

#[test]
fn manual_members_override_template_members() {
    let registry = TypeRegistry::new();
    let template = Template::builder(&registry.object_class())
        .property("size", PropertyDescriptor::int32().with_range(0.0, 10.0))
        .build();
    let class = ClassBuilder::new("Box", template)
        .property("size", PropertyDescriptor::double().with_range(0.0, 1.0))
        .accessor("size", stored("size"))
        .register(&registry)
        .unwrap();

    let spec = class.handle().find_property("size").unwrap();
    assert_eq!(spec.value_kind(), ValueKind::Double);

    let instance = class.create(&MainLoop::new()).unwrap();
    instance.set_property("size", 5).unwrap();
    assert_eq!(instance.property("size").unwrap(), Value::Double(1.0));
}

#[test]
fn cloned_template_registers_sibling_classes() {
    let registry = TypeRegistry::new();
    let template = Template::builder(&registry.widget_class())
        .signal("activated", SignalDescriptor::new())
        .build();

    let left = ClassBuilder::new("LeftPane", template.clone())
        .register(&registry)
        .unwrap();
    let right = ClassBuilder::new("RightPane", template)
        .register(&registry)
        .unwrap();

    assert!(left.handle().find_signal("activated").is_some());
    assert!(right.handle().find_signal("activated").is_some());
    assert!(!left.handle().is_a(right.handle()));
}

#[test]
fn type_flags_are_enforced() {
    let registry = TypeRegistry::new();
    let shape = ClassBuilder::without_template("Shape", &registry.widget_class())
        .with_type_flags(TypeFlags::ABSTRACT)
        .register(&registry)
        .unwrap();
    assert!(matches!(
        shape.create(&MainLoop::new()),
        Err(Error::Platform(CoreError::AbstractType { .. }))
    ));

    let circle = ClassBuilder::without_template("Circle", shape.handle())
        .with_type_flags(TypeFlags::FINAL)
        .register(&registry)
        .unwrap();
    let instance = circle.create(&MainLoop::new()).unwrap();
    assert!(instance.class().is_a(shape.handle()));

    let err = ClassBuilder::without_template("Ellipse", circle.handle())
        .register(&registry)
        .unwrap_err();
    assert!(matches!(err, Error::Platform(CoreError::FinalParent { .. })));
}

#[test]
fn enum_and_boxed_properties_need_registered_types() {
    let registry = TypeRegistry::new();
    let template = Template::builder(&registry.object_class())
        .property(
            "align",
            PropertyDescriptor::enumeration("Align").with_flags(PropertyFlags::ConstructOnly),
        )
        .build();

    let err = ClassBuilder::new("Text", template.clone())
        .register(&registry)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedPropertyKind { ref kind, .. } if kind == "enum<Align>"));

    registry
        .register_enum("Align", &[(0, "start"), (1, "center"), (2, "end")])
        .unwrap();
    registry.register_boxed("Margins").unwrap();
    let class = ClassBuilder::new("Text", template)
        .property(
            "margins",
            PropertyDescriptor::boxed("Margins").with_flags(PropertyFlags::ConstructOnly),
        )
        .register(&registry)
        .unwrap();

    let text = class
        .create_with(&MainLoop::new(), ConstructArgs::new().property("align", Value::Enum(1)))
        .unwrap();
    assert_eq!(text.property("align").unwrap(), Value::Enum(1));
    assert!(text.property("margins").unwrap().is_null());
}

#[test]
fn ready_runs_once_on_the_next_idle_cycle() {
    init_tracing();
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let class = ClassBuilder::without_template("Panel", &registry.widget_class())
        .on_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .register(&registry)
        .unwrap();

    let _first = class.create(&main_loop).unwrap();
    let _second = class.create(&main_loop).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    main_loop.iterate();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    main_loop.run_until_idle();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_ready_hooks_do_not_affect_others() {
    init_tracing();
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let broken = ClassBuilder::without_template("Broken", &registry.widget_class())
        .on_ready(|_| Err("resource missing".into()))
        .register(&registry)
        .unwrap();
    let panicking = ClassBuilder::without_template("Panicking", &registry.widget_class())
        .on_ready(|_| panic!("ready exploded"))
        .register(&registry)
        .unwrap();
    let counter = calls.clone();
    let healthy = ClassBuilder::without_template("Healthy", &registry.widget_class())
        .on_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .register(&registry)
        .unwrap();

    let _broken = broken.create(&main_loop).unwrap();
    let _panicking = panicking.create(&main_loop).unwrap();
    let _healthy = healthy.create(&main_loop).unwrap();
    main_loop.run_until_idle();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn async_ready_hook_runs_on_the_loop() {
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let class = ClassBuilder::without_template("Feed", &registry.widget_class())
        .property("loaded", PropertyDescriptor::boolean())
        .accessor("loaded", stored("loaded"))
        .on_ready_async(|feed: Instance| async move {
            feed.main_loop().idle().await;
            feed.set_property("loaded", true)?;
            Ok::<(), BoxError>(())
        })
        .register(&registry)
        .unwrap();

    let feed = class.create(&main_loop).unwrap();
    assert_eq!(feed.property("loaded").unwrap(), Value::Bool(false));
    main_loop.run_until_idle();
    assert_eq!(feed.property("loaded").unwrap(), Value::Bool(true));
}

#[test]
fn actions_follow_the_instance_capability() {
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let quit = ActionDescriptor::new().with_accels(["<Ctrl>q", "<Ctrl>w"]);

    let app_template = Template::builder(&registry.application_class())
        .action("quit", quit.clone())
        .build();
    let app = ClassBuilder::new("Editor", app_template)
        .register(&registry)
        .unwrap()
        .create(&main_loop)
        .unwrap();
    assert!(app.action_map().unwrap().has_action("quit"));
    assert_eq!(
        app.accels_for_action("app.quit"),
        vec!["<Ctrl>q".to_owned(), "<Ctrl>w".to_owned()]
    );
    assert_eq!(app.actions_for_accel("<Ctrl>w"), vec!["app.quit".to_owned()]);

    let window = ClassBuilder::without_template("EditorWindow", &registry.window_class())
        .register(&registry)
        .unwrap();
    let window_template = Template::builder(window.handle())
        .action("close", quit)
        .build();
    let dialog = ClassBuilder::new("Preferences", window_template)
        .register(&registry)
        .unwrap()
        .create(&main_loop)
        .unwrap();
    assert!(dialog.action_map().unwrap().has_action("close"));
    assert!(dialog.accels_for_action("win.close").is_empty());

    let plain = ClassBuilder::new(
        "Model",
        Template::builder(&registry.object_class())
            .action("reload", ActionDescriptor::new())
            .build(),
    )
    .register(&registry)
    .unwrap()
    .create(&main_loop)
    .unwrap();
    assert!(plain.action("reload").is_none());
    assert!(plain.action_prefixes().is_empty());
}

#[test]
fn widget_actions_share_one_group() {
    let registry = TypeRegistry::new();
    let toggled = Arc::new(AtomicUsize::new(0));

    let counter = toggled.clone();
    let template = Template::builder(&registry.widget_class())
        .action("bold", ActionDescriptor::new().with_state(false))
        .action(
            "italic",
            ActionDescriptor::new().with_handler(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .build();
    let class = ClassBuilder::new("FormatBar", template)
        .register(&registry)
        .unwrap();

    let bar = class.create(&MainLoop::new()).unwrap();
    assert_eq!(bar.action_prefixes(), vec!["FormatBar".to_owned()]);
    let group = bar.action_group("FormatBar").unwrap();
    assert_eq!(group.list_actions(), vec!["bold".to_owned(), "italic".to_owned()]);

    bar.activate_action("FormatBar.bold", None).unwrap();
    assert_eq!(bar.action("bold").unwrap().state(), Some(Value::Bool(true)));

    bar.activate_action("FormatBar.italic", None).unwrap();
    assert_eq!(toggled.load(Ordering::SeqCst), 1);

    let other = class.create(&MainLoop::new()).unwrap();
    assert!(!other.action_group("FormatBar").unwrap().ptr_eq(&group));
}

#[test]
fn subclass_inherits_parent_validation() {
    init_tracing();
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let hooks = Arc::new(Mutex::new(Vec::new()));

    let log = hooks.clone();
    let template = Template::builder(&registry.widget_class())
        .property("level", PropertyDescriptor::int32().with_range(0.0, 10.0))
        .action(
            "reset",
            ActionDescriptor::new().with_handler(|gauge, _| {
                gauge.set_property("level", 0).unwrap();
            }),
        )
        .build();
    let gauge = ClassBuilder::new("Gauge", template)
        .accessor("level", stored("level"))
        .on_ready(move |_| {
            log.lock().push("Gauge");
            Ok(())
        })
        .register(&registry)
        .unwrap();

    let log = hooks.clone();
    let fancy = ClassBuilder::without_template("FancyGauge", gauge.handle())
        .property("glow", PropertyDescriptor::double().with_range(0.0, 1.0))
        .accessor("glow", stored("glow"))
        .on_ready(move |_| {
            log.lock().push("FancyGauge");
            Ok(())
        })
        .register(&registry)
        .unwrap();

    let plain = gauge.create(&main_loop).unwrap();
    plain.set_property("level", 42).unwrap();
    assert_eq!(plain.property("level").unwrap(), Value::Int(10));

    let derived = fancy.create(&main_loop).unwrap();
    derived.set_property("level", 42).unwrap();
    assert_eq!(derived.property("level").unwrap(), Value::Int(10));
    derived.set_property("level", -3.5).unwrap();
    assert_eq!(derived.property("level").unwrap(), Value::Int(0));
    derived.set_property("glow", 2.0).unwrap();
    assert_eq!(derived.property("glow").unwrap(), Value::Double(1.0));

    derived.set_property("level", 6).unwrap();
    derived.activate_action("FancyGauge.reset", None).unwrap();
    assert_eq!(derived.property("level").unwrap(), Value::Int(0));

    main_loop.run_until_idle();
    assert_eq!(*hooks.lock(), vec!["Gauge", "Gauge", "FancyGauge"]);
}

#[test]
fn subclass_keeps_parent_accessor_contract() {
    let registry = TypeRegistry::new();
    let counter = ClassBuilder::without_template("Counter", &registry.object_class())
        .property("count", PropertyDescriptor::uint32())
        .on_init(|instance| instance.define_accessor("count", stored("count")))
        .register(&registry)
        .unwrap();
    let ticker = ClassBuilder::without_template("Ticker", counter.handle())
        .register(&registry)
        .unwrap();
    let ticker = ticker.create(&MainLoop::new()).unwrap();
    ticker.set_property("count", -1).unwrap();
    assert_eq!(ticker.property("count").unwrap(), Value::UInt(0));

    let strict = ClassBuilder::without_template("Strict", &registry.object_class())
        .property("limit", PropertyDescriptor::int32())
        .accessor("limit", Accessor::new(|_| None, |_, _| {}))
        .register(&registry)
        .unwrap();
    let lax = ClassBuilder::without_template("Lax", strict.handle())
        .property("extra", PropertyDescriptor::int32())
        .register(&registry)
        .unwrap();
    assert_eq!(
        lax.create(&MainLoop::new()).unwrap_err(),
        Error::AccessorContract {
            class: "Lax".into(),
            property: "extra".into(),
        }
    );
}

#[test]
fn object_property_rejects_foreign_class() {
    let registry = TypeRegistry::new();
    let main_loop = MainLoop::new();
    let button = ClassBuilder::without_template("Button", &registry.widget_class())
        .register(&registry)
        .unwrap();
    let toolbar = ClassBuilder::without_template("Toolbar", &registry.widget_class())
        .property("target", PropertyDescriptor::object().with_object_type("Button"))
        .accessor("target", stored("target"))
        .register(&registry)
        .unwrap()
        .create(&main_loop)
        .unwrap();

    let stranger = Instance::new(&registry.object_class(), &main_loop).unwrap();
    assert!(matches!(
        toolbar.set_property("target", Value::Object(Some(stranger))),
        Err(CoreError::InvalidValue { .. })
    ));
    assert!(toolbar.property("target").unwrap().is_null());

    let ok = button.create(&main_loop).unwrap();
    toolbar
        .set_property("target", Value::Object(Some(ok.clone())))
        .unwrap();
    assert!(matches!(
        toolbar.property("target").unwrap(),
        Value::Object(Some(target)) if target.ptr_eq(&ok)
    ));
}

#[test]
fn enum_property_rejects_values_outside_the_enumeration() {
    let registry = TypeRegistry::new();
    registry
        .register_enum("Wrap", &[(0, "none"), (1, "word"), (2, "char")])
        .unwrap();
    let label = ClassBuilder::without_template("Label", &registry.widget_class())
        .property("wrap", PropertyDescriptor::enumeration("Wrap"))
        .accessor("wrap", stored("wrap"))
        .register(&registry)
        .unwrap()
        .create(&MainLoop::new())
        .unwrap();

    label.set_property("wrap", 2).unwrap();
    assert_eq!(label.property("wrap").unwrap(), Value::Enum(2));
    assert!(matches!(
        label.set_property("wrap", Value::Enum(9)),
        Err(CoreError::InvalidValue { .. })
    ));
    assert_eq!(label.property("wrap").unwrap(), Value::Enum(2));
}

#[test]
fn class_tree_lists_registered_subclasses() {
    let registry = TypeRegistry::new();
    let gauge = ClassBuilder::without_template("Gauge", &registry.widget_class())
        .property("level", PropertyDescriptor::int32())
        .accessor("level", stored("level"))
        .register(&registry)
        .unwrap();
    ClassBuilder::without_template("FancyGauge", gauge.handle())
        .register(&registry)
        .unwrap();

    let tree = ClassTreeDebug::with_options(&registry, TreeFormatOptions::detailed())
        .format_subtree(gauge.handle());
    let lines: Vec<&str> = tree.lines().collect();
    assert_eq!(lines[0], "Gauge <Widget>");
    assert!(lines[1].ends_with(".level : int32"));
    assert!(lines[2].ends_with("FancyGauge <Widget>"));
}
