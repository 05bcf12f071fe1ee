use approx::assert_relative_eq;
use sonoframe_chain::{ArgPath, ChainArena, ChainError, KinematicChain};
use sonoframe_ir::{flatten_hierarchy, FrameDocument, HierarchyNode};
use sonoframe_math::{Point3, Vec3};

const FRAME_JSON: &str = r#"{
  "version": "0.1",
  "chains": [
    {
      "name": "Main frame",
      "constants": { "L1": 0.02, "L2": 0.04 },
      "joints": [
        { "name": "DV_offset", "transforms": [
            { "kind": "translation", "axis": "z", "value": "csts['L2']" } ] },
        { "name": "AP knob", "transforms": [
            { "kind": "translation", "axis": "x", "value": -0.005,
              "editable": { "increment": 0.0005, "label": "AP" } } ] }
      ]
    },
    {
      "name": "Transducer",
      "mount": "Rx180deg",
      "constants": { "L1": 0.02 },
      "joints": [
        { "name": "drop", "transforms": [
            { "kind": "translation", "axis": "z", "value": "-L1/2" } ] }
      ]
    },
    { "name": "Sim domain" }
  ],
  "hierarchy": [
    { "name": "Main frame", "children": [
        { "name": "Transducer", "children": [ { "name": "Sim domain" } ] } ] }
  ]
}"#;

fn load() -> ChainArena {
    let doc = FrameDocument::from_json(FRAME_JSON).unwrap();
    let mut arena = ChainArena::new();
    for cfg in doc.chains {
        arena.insert(KinematicChain::new(cfg)).unwrap();
    }
    arena.apply_hierarchy(&flatten_hierarchy(&doc.hierarchy)).unwrap();
    arena.resolve_transforms();
    arena
}

#[test]
fn test_document_to_resolved_frame() {
    let mut arena = load();
    let sim = arena.require("Sim domain").unwrap();
    let end = arena.get_mut(sim).unwrap().end_transform();

    // Main frame ends at (-0.005, 0, 0.04); the transducer drops 0.01 in z
    // and flips, the jointless domain sits at the transducer end.
    let p = end.origin();
    assert_relative_eq!(p.x, -0.005, epsilon = 1e-12);
    assert_relative_eq!(p.z, 0.03, epsilon = 1e-12);
    let z = end.apply_vec(&Vec3::z());
    assert_relative_eq!(z.z, -1.0, epsilon = 1e-12);
    assert_eq!(arena.depth(sim), 2);
}

#[test]
fn test_nudge_propagates_after_resolve() {
    let mut arena = load();
    let main = arena.require("Main frame").unwrap();
    let tx = arena.require("Transducer").unwrap();
    arena
        .get_mut(main)
        .unwrap()
        .nudge(&ArgPath::new("AP knob", 0), 2.0)
        .unwrap();
    arena.resolve_transforms();
    let pose = arena.get_mut(tx).unwrap().pose();
    assert_relative_eq!(pose.endpoints[0].x, -0.004, epsilon = 1e-12);
    assert_ne!(pose.endpoints[1], Point3::origin());
}

#[test]
fn test_hierarchy_cannot_loop() {
    let mut arena = load();
    let main = arena.require("Main frame").unwrap();
    let sim = arena.require("Sim domain").unwrap();
    assert!(matches!(arena.set_parent(main, Some(sim)), Err(ChainError::Cycle { .. })));

    assert_eq!(arena.parent(main), None);

    // A hierarchy naming the domain as root detaches it first, so the
    // same link is accepted there. Unmentioned links are kept.
    let reversed = vec![HierarchyNode::with_children(
        "Sim domain",
        vec![HierarchyNode::leaf("Main frame")],
    )];
    arena.apply_hierarchy(&flatten_hierarchy(&reversed)).unwrap();
    assert_eq!(arena.parent(sim), None);
    assert_eq!(arena.parent(main), Some(sim));
    assert_eq!(arena.depth(arena.require("Transducer").unwrap()), 2);
}
