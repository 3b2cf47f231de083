use davhost_core::{extract_identifiers, ExtensionKind, Manifest};

fn json(source: &str) -> Manifest {
    Manifest::from_json_str(source).unwrap()
}

#[test]
fn missing_sabre_section_or_leaf_yields_nothing() {
    let cases = [
        r#"{"id": "files"}"#,
        r#"{"sabre": {}}"#,
        r#"{"sabre": {"plugins": {}}}"#,
        r#"{"sabre": {"collections": {"collection": "C1"}}}"#,
    ];
    for source in cases {
        assert!(
            extract_identifiers(&json(source), ExtensionKind::Plugin).is_empty(),
            "`{source}` must declare no plugins"
        );
    }
    assert!(extract_identifiers(&Manifest::empty(), ExtensionKind::Collection).is_empty());
}

#[test]
fn scalar_and_sequence_leaves_are_normalized_to_lists() {
    let scalar = json(r#"{"sabre": {"plugins": {"plugin": "x"}}}"#);
    assert_eq!(extract_identifiers(&scalar, ExtensionKind::Plugin), vec!["x"]);

    let sequence = json(r#"{"sabre": {"plugins": {"plugin": ["x", "y"]}}}"#);
    assert_eq!(
        extract_identifiers(&sequence, ExtensionKind::Plugin),
        vec!["x", "y"]
    );
}

#[test]
fn xml_and_json_manifests_extract_the_same_declarations() {
    let from_xml = Manifest::from_xml_str(
        r#"<?xml version="1.0"?>
        <info xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
            <id>dav</id>
            <sabre>
                <collections>
                    <collection>OCA\DAV\RootCollection</collection>
                </collections>
                <plugins>
                    <plugin>OCA\DAV\Plugin\Auth</plugin>
                    <plugin>OCA\DAV\Plugin\Props</plugin>
                </plugins>
            </sabre>
        </info>"#,
    )
    .unwrap();
    let from_json = json(
        r#"{"id": "dav", "sabre": {
              "collections": {"collection": "OCA\\DAV\\RootCollection"},
              "plugins": {"plugin": ["OCA\\DAV\\Plugin\\Auth", "OCA\\DAV\\Plugin\\Props"]}}}"#,
    );

    for kind in [ExtensionKind::Plugin, ExtensionKind::Collection] {
        assert_eq!(
            extract_identifiers(&from_xml, kind),
            extract_identifiers(&from_json, kind)
        );
    }
    assert_eq!(
        extract_identifiers(&from_xml, ExtensionKind::Collection),
        vec!["OCA\\DAV\\RootCollection"]
    );
}

#[test]
fn extraction_is_idempotent() {
    let manifest = json(r#"{"sabre": {"plugins": {"plugin": ["A", "B"]}}}"#);
    let first = extract_identifiers(&manifest, ExtensionKind::Plugin);
    let second = extract_identifiers(&manifest, ExtensionKind::Plugin);
    assert_eq!(first, second);
    assert_eq!(first, vec!["A", "B"]);
}
