use serde_json::json;
use sonoframe_ir::{
    AttachmentConfig, Axis, FrameDocument, IrError, JsonFileSettings, SettingsStore, TransformKind,
};

const FRAME_TOML: &str = r#"
version = "0.1"

[[chains]]
name = "Main frame"
mount = "Rx0deg"

[chains.constants]
L1 = 0.02
L2 = 0.04

[[chains.joints]]
name = "ML_offset_1"

[[chains.joints.transforms]]
kind = "translation"
axis = "y"
value = "csts['L1']*2"

[[chains]]
name = "Skull"

[[chains.attachments]]
type = "mesh"
mesh = "skull"
transform = "S1 Rx0deg Tz0mm"

[[hierarchy]]
name = "Main frame"

[[hierarchy.children]]
name = "Skull"
"#;

#[test]
fn test_load_toml_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.toml");
    std::fs::write(&path, FRAME_TOML).unwrap();

    let doc = FrameDocument::load(&path).unwrap();
    assert_eq!(doc.chains.len(), 2);
    let main = doc.chain("Main frame").unwrap();
    assert_eq!(main.constants["L2"], 0.04);
    let t = &main.joints[0].transforms[0];
    assert_eq!(t.kind, TransformKind::Translation);
    assert_eq!(t.axis, Axis::Y);
    assert!(matches!(
        doc.chain("Skull").unwrap().attachments[0],
        AttachmentConfig::Mesh(_)
    ));
    assert_eq!(doc.hierarchy[0].children[0].name, "Skull");
}

#[test]
fn test_json_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let doc = FrameDocument::from_toml(FRAME_TOML).unwrap();
    let path = dir.path().join("frame.json");
    doc.save_json(&path).unwrap();
    assert_eq!(FrameDocument::load(&path).unwrap(), doc);
}

#[test]
fn test_unknown_extension_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.yaml");
    std::fs::write(&path, "chains: []").unwrap();
    assert!(matches!(
        FrameDocument::load(&path).unwrap_err(),
        IrError::UnsupportedFormat(_)
    ));
}

#[test]
fn test_settings_file_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("settings.json");
    {
        let mut s = JsonFileSettings::open(&path).unwrap();
        s.set_value("armature.Mainframe.visible", json!(false));
        assert_eq!(s.get("armature.Mainframe.constants", json!({"L1": 0.02})), json!({"L1": 0.02}));
        s.save().unwrap();
    }
    let s = JsonFileSettings::open(&path).unwrap();
    assert_eq!(s.get_value("armature.Mainframe.visible"), Some(json!(false)));
    assert_eq!(s.children("armature.Mainframe"), vec!["constants", "visible"]);
}

#[test]
fn test_settings_file_must_be_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "[1, 2]").unwrap();
    assert!(matches!(
        JsonFileSettings::open(&path).unwrap_err(),
        IrError::InvalidSettings(_)
    ));
}
