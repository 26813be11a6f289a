use serde_json::json;
use test_log::test;

use crate::*;

fn component(name: &str) -> Component {
    Component::new(name).unwrap()
}

/// The two-level example hierarchy: `top` instantiates `sub` as `u`, and
/// `sub` wraps a single `wg` instance named `v`.
fn example_hierarchy() -> RecursiveNetlist {
    RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {"u": {"component": "sub"}},
            "connections": {},
            "ports": {"out": "u,o"},
        },
        "sub": {
            "instances": {"v": {"component": "wg"}},
            "connections": {},
            "ports": {"o": "v,o1"},
        },
    }))
    .unwrap()
}

#[test]
fn example_hierarchy_flattens() {
    let flat = example_hierarchy().flatten().unwrap();
    assert!(flat.issues.is_empty());

    let expected = json!({
        "instances": {"u~v": {"component": "wg"}},
        "connections": {},
        "ports": {"out": "u~v,o1"},
        "placements": {},
    });
    assert_eq!(serde_json::to_value(&flat.netlist).unwrap(), expected);
}

#[test]
fn flattening_mangles_names_with_the_separator() {
    let mut sub = Netlist::new();
    sub.add_instance("a", component("lf")).unwrap();
    sub.add_instance("v", component("wg")).unwrap();
    sub.connect("a,p1", "v,p2").unwrap();

    let mut top = Netlist::new();
    top.add_instance("u", component("sub")).unwrap();

    let mut recnet = RecursiveNetlist::new();
    recnet.add_netlist("top", top).unwrap();
    recnet.add_netlist("sub", sub).unwrap();

    let flat = recnet.flatten().unwrap();
    assert!(flat.netlist.instances().contains_key("u~a"));
    assert!(flat.netlist.instances().contains_key("u~v"));

    let connections: Vec<(String, String)> = flat
        .netlist
        .connections()
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    assert_eq!(
        connections,
        vec![("u~a,p1".to_string(), "u~v,p2".to_string())]
    );
}

#[test]
fn flattening_supports_custom_separators() {
    let flat = example_hierarchy().flatten_with_separator(":").unwrap();
    assert!(flat.netlist.instances().contains_key("u:v"));
    assert_eq!(flat.netlist.ports()["out"].to_string(), "u:v,o1");
}

#[test]
fn identifier_like_separators_are_rejected() {
    let recnet = example_hierarchy();
    assert!(matches!(
        recnet.flatten_with_separator("_"),
        Err(Error::InvalidSeparator(_))
    ));
    assert!(matches!(
        recnet.flatten_with_separator(""),
        Err(Error::InvalidSeparator(_))
    ));
}

#[test]
fn flattening_is_exhaustive() {
    let recnet = RecursiveNetlist::from_value(json!({
        "a": {
            "instances": {"x": {"component": "b"}},
            "ports": {"p": "x,p"},
        },
        "b": {
            "instances": {"y": {"component": "c"}},
            "ports": {"p": "y,p"},
        },
        "c": {
            "instances": {"z": {"component": "wg"}},
            "ports": {"p": "z,o1"},
        },
    }))
    .unwrap();

    let flat = recnet.flatten().unwrap();
    assert!(flat.issues.is_empty());
    assert!(flat.netlist.instances().contains_key("x~y~z"));
    for (_, comp) in flat.netlist.instances() {
        assert!(!recnet.contains(comp.name()));
    }
    assert_eq!(flat.netlist.ports()["p"].to_string(), "x~y~z,o1");
}

#[test]
fn flattening_preserves_resolvable_ports() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {
                "u": {"component": "sub"},
                "w": {"component": "wg"},
            },
            "connections": {"u,o": "w,in"},
            "ports": {
                "through": "u,i",
                "direct": "w,out",
            },
        },
        "sub": {
            "instances": {"v": {"component": "wg"}},
            "ports": {"i": "v,in", "o": "v,out"},
        },
    }))
    .unwrap();

    let top_ports: Vec<_> = recnet.top().unwrap().1.ports().keys().cloned().collect();
    let flat = recnet.flatten().unwrap();
    let flat_ports: Vec<_> = flat.netlist.ports().keys().cloned().collect();
    assert_eq!(top_ports, flat_ports);
    assert_eq!(flat.netlist.ports()["through"].to_string(), "u~v,in");
    assert_eq!(flat.netlist.ports()["direct"].to_string(), "w,out");
    assert!(flat.issues.is_empty());
}

#[test]
fn missing_child_port_drops_only_that_connection() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {
                "u": {"component": "sub"},
                "w": {"component": "wg"},
            },
            "connections": {
                "u,missing": "w,in",
                "u,o": "w,out",
            },
            "ports": {"p": "u,o"},
        },
        "sub": {
            "instances": {"v": {"component": "wg"}},
            "ports": {"o": "v,out"},
        },
    }))
    .unwrap();

    let flat = recnet.flatten().unwrap();
    assert_eq!(flat.issues.len(), 1);
    assert!(flat.issues.has_warning());

    let connections: Vec<(String, String)> = flat
        .netlist
        .connections()
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    assert_eq!(
        connections,
        vec![("u~v,out".to_string(), "w,out".to_string())]
    );
    assert_eq!(flat.netlist.ports()["p"].to_string(), "u~v,out");
}

#[test]
fn missing_child_port_on_the_value_side_is_also_dropped() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {
                "u": {"component": "sub"},
                "w": {"component": "wg"},
            },
            "connections": {"w,out": "u,missing"},
        },
        "sub": {
            "instances": {"v": {"component": "wg"}},
            "ports": {"o": "v,out"},
        },
    }))
    .unwrap();

    let flat = recnet.flatten().unwrap();
    assert_eq!(flat.issues.len(), 1);
    assert!(flat.netlist.connections().is_empty());
}

#[test]
fn unresolvable_port_targets_are_dropped_with_a_warning() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {"u": {"component": "sub"}},
            "ports": {"out": "u,nope"},
        },
        "sub": {
            "instances": {"v": {"component": "wg"}},
            "ports": {"o": "v,out"},
        },
    }))
    .unwrap();

    let flat = recnet.flatten().unwrap();
    assert!(flat.netlist.ports().is_empty());
    assert_eq!(flat.issues.len(), 1);
    assert!(flat.issues.has_warning());
}

#[test]
fn cyclic_hierarchies_fail_fast() {
    let recnet = RecursiveNetlist::from_value(json!({
        "a": {"instances": {"x": {"component": "b"}}},
        "b": {"instances": {"y": {"component": "a"}}},
    }))
    .unwrap();
    match recnet.flatten() {
        Err(Error::CyclicHierarchy { cycle }) => assert_eq!(cycle, ["a", "b", "a"]),
        other => panic!("expected CyclicHierarchy, got {:?}", other.map(|f| f.netlist)),
    }

    let direct = RecursiveNetlist::from_value(json!({
        "a": {"instances": {"x": {"component": "a"}}},
    }))
    .unwrap();
    assert!(matches!(
        direct.flatten(),
        Err(Error::CyclicHierarchy { .. })
    ));
}

#[test]
fn empty_hierarchy_flattens_to_an_empty_netlist() {
    let flat = RecursiveNetlist::new().flatten().unwrap();
    assert!(flat.netlist.instances().is_empty());
    assert!(flat.issues.is_empty());
}

fn prunable_netlist() -> Netlist {
    let mut net = Netlist::new();
    net.add_instance("a", component("wg")).unwrap();
    net.add_instance("b", component("wg")).unwrap();
    net.add_instance("c", component("wg")).unwrap();
    net.add_instance("d", component("wg")).unwrap();
    net.connect("a,o2", "b,o1").unwrap();
    net.connect("c,o2", "d,o1").unwrap();
    net.expose_port("in", "a,o1").unwrap();
    net
}

#[test]
fn pruning_removes_instances_unreachable_from_ports() {
    let pruned = prunable_netlist().prune_unused();
    assert!(pruned.instances().contains_key("a"));
    assert!(pruned.instances().contains_key("b"));
    assert!(!pruned.instances().contains_key("c"));
    assert!(!pruned.instances().contains_key("d"));

    // The c<->d wire went with its instances; the a<->b wire survives.
    assert_eq!(pruned.connections().len(), 1);
    assert_eq!(pruned.ports().len(), 1);
}

#[test]
fn pruning_is_idempotent() {
    let once = prunable_netlist().prune_unused();
    let twice = once.prune_unused();
    assert_eq!(once, twice);
}

#[test]
fn pruning_with_no_ports_removes_everything() {
    let mut net = Netlist::new();
    net.add_instance("a", component("wg")).unwrap();
    net.add_instance("b", component("wg")).unwrap();
    net.connect("a,o2", "b,o1").unwrap();

    let pruned = net.prune_unused();
    assert!(pruned.instances().is_empty());
    assert!(pruned.connections().is_empty());
    assert!(pruned.ports().is_empty());
}

#[test]
fn pruning_tolerates_dangling_connections() {
    let mut net = Netlist::new();
    net.add_instance("a", component("wg")).unwrap();
    net.connect("ghost,o1", "phantom,o2").unwrap();
    net.expose_port("in", "a,o1").unwrap();

    let pruned = net.prune_unused();
    assert!(pruned.instances().contains_key("a"));
    assert!(pruned.connections().is_empty());
}

#[test]
fn pruning_carries_placements_unchanged() {
    let mut net = prunable_netlist();
    net.place("c", Placement::default()).unwrap();
    let pruned = net.prune_unused();
    assert!(!pruned.instances().contains_key("c"));
    assert!(pruned.placements().contains_key("c"));
}

#[test]
fn pruning_applies_to_every_hierarchy_level() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {
                "u": {"component": "sub"},
                "orphan": {"component": "wg"},
            },
            "ports": {"out": "u,o"},
        },
        "sub": {
            "instances": {
                "v": {"component": "wg"},
                "stray": {"component": "wg"},
            },
            "ports": {"o": "v,o1"},
        },
    }))
    .unwrap();

    let pruned = recnet.prune_unused();
    assert!(!pruned.get("top").unwrap().instances().contains_key("orphan"));
    assert!(!pruned.get("sub").unwrap().instances().contains_key("stray"));
    assert!(pruned.get("top").unwrap().instances().contains_key("u"));
    assert!(pruned.get("sub").unwrap().instances().contains_key("v"));
}

#[test]
fn construction_entry_wraps_flat_shapes() {
    let recnet = netlist(
        json!({
            "instances": {"v": "wg"},
            "ports": {"o": "v,o1"},
        }),
        false,
    )
    .unwrap();
    assert_eq!(recnet.top().unwrap().0, TOP_LEVEL_KEY);
    assert_eq!(recnet.len(), 1);
    // A bare string instance coerces to a component with no settings.
    let v = recnet.top().unwrap().1.instance("v").unwrap();
    assert_eq!(v.name(), "wg");
    assert!(v.settings().is_empty());
}

#[test]
fn construction_entry_passes_hierarchies_through() {
    let recnet = netlist(example_hierarchy(), false).unwrap();
    assert_eq!(recnet.top().unwrap().0, "top");

    let mut flat = Netlist::new();
    flat.add_instance("v", component("wg")).unwrap();
    let wrapped = netlist(flat, false).unwrap();
    assert_eq!(wrapped.top().unwrap().0, TOP_LEVEL_KEY);
}

#[test]
fn construction_entry_can_prune_every_level() {
    let recnet = netlist(
        json!({
            "instances": {
                "a": {"component": "wg"},
                "orphan": {"component": "wg"},
            },
            "ports": {"in": "a,o1"},
        }),
        true,
    )
    .unwrap();
    let top = recnet.top().unwrap().1;
    assert!(top.instances().contains_key("a"));
    assert!(!top.instances().contains_key("orphan"));
}

#[test]
fn construction_entry_rejects_malformed_input() {
    assert!(matches!(
        netlist(json!("not a netlist"), false),
        Err(Error::MalformedInput(_))
    ));
    assert!(matches!(
        netlist(json!(42), false),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn construction_rejects_commas_in_names() {
    let mut net = Netlist::new();
    assert!(matches!(
        net.add_instance("a,b", component("wg")),
        Err(Error::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        Component::new("a,b"),
        Err(Error::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        netlist(
            json!({"instances": {"a,b": {"component": "wg"}}}),
            false
        ),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn construction_canonicalizes_names() {
    let mut net = Netlist::new();
    let name = net.add_instance("My Inst!", component("wg")).unwrap();
    assert_eq!(name, "My_Inst_");
    let again = net.add_instance("My Inst!", component("wg")).unwrap();
    assert_eq!(name, again);
    assert_eq!(net.instances().len(), 1);
}

#[test]
fn component_dollar_suffix_is_stripped() {
    assert_eq!(component("coupler$1").name(), "coupler");
    let recnet = netlist(
        json!({"instances": {"c1": {"component": "coupler$5"}}}),
        false,
    )
    .unwrap();
    assert_eq!(
        recnet.top().unwrap().1.instance("c1").unwrap().name(),
        "coupler"
    );
}

#[test]
fn component_settings_pass_through_opaquely() {
    let recnet = netlist(
        json!({
            "instances": {
                "w": {
                    "component": "wg",
                    "settings": {"length": 10.5, "model": "strip"},
                },
            },
        }),
        false,
    )
    .unwrap();
    let w = recnet.top().unwrap().1.instance("w").unwrap();
    assert_eq!(w.settings()["length"], json!(10.5));
    assert_eq!(w.settings()["model"], json!("strip"));
}

#[test]
fn placements_deserialize_and_stay_opaque() {
    let recnet = netlist(
        json!({
            "instances": {"w": "wg"},
            "placements": {
                "w": {"x": 10.0, "y": "b,north", "rotation": 90.0, "mirror": true, "port": "ne"},
            },
            "ports": {"o": "w,o1"},
        }),
        false,
    )
    .unwrap();
    let placement = &recnet.top().unwrap().1.placements()["w"];
    assert_eq!(placement.x, Coord::Num(10.0));
    assert_eq!(placement.y, Coord::Expr("b,north".into()));
    assert_eq!(placement.rotation, 90.0);
    assert!(placement.mirror);
    assert_eq!(
        placement.port,
        Some(PortAnchor::Compass(CompassAnchor::Ne))
    );

    // Flattening drops placements entirely.
    let recnet = example_hierarchy();
    let flat = recnet.flatten().unwrap();
    assert!(flat.netlist.placements().is_empty());
}

#[test]
fn instances_by_prefix_returns_matches_in_order() {
    let mut recnet = RecursiveNetlist::new();
    recnet.add_netlist("mzi_top", Netlist::new()).unwrap();
    recnet.add_netlist("coupler", Netlist::new()).unwrap();
    recnet.add_netlist("mzi_arm", Netlist::new()).unwrap();

    assert_eq!(recnet.instances_by_prefix("mzi"), ["mzi_top", "mzi_arm"]);
    assert!(recnet.instances_by_prefix("ring").is_empty());
}

#[test]
fn component_instances_scans_the_first_matching_netlist() {
    let mut top = Netlist::new();
    top.add_instance("w1", component("wg_long")).unwrap();
    top.add_instance("c1", component("coupler")).unwrap();
    top.add_instance("w2", component("wg_short")).unwrap();

    let mut recnet = RecursiveNetlist::new();
    recnet.add_netlist("mzi_top", top).unwrap();
    recnet.add_netlist("mzi_arm", Netlist::new()).unwrap();

    let names = recnet.component_instances("mzi", "wg").unwrap();
    assert_eq!(names, ["w1", "w2"]);

    assert!(matches!(
        recnet.component_instances("ring", "wg"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn validation_reports_dangling_references() {
    let recnet = RecursiveNetlist::from_value(json!({
        "top": {
            "instances": {"a": {"component": "wg"}},
            "connections": {"a,o2": "ghost,o1"},
            "ports": {"in": "a,o1", "bad": "phantom,o2"},
        },
    }))
    .unwrap();

    let issues = recnet.validate();
    assert_eq!(issues.len(), 2);
    assert!(issues.has_warning());
    assert!(!issues.has_error());

    let clean = example_hierarchy();
    assert!(clean.validate().is_empty());
}

#[test]
fn hierarchies_survive_a_serde_round_trip() {
    let recnet = example_hierarchy();
    let value = serde_json::to_value(&recnet).unwrap();
    let back = RecursiveNetlist::from_value(value).unwrap();
    assert_eq!(recnet, back);
}
