//! Reading, inference and reconciliation through the public API

use geo_import_sdk::import::{ImportError, ReaderOptions, import_file};
use geo_import_sdk::models::{DataFormat, FieldDefinition, FieldType};
use geo_import_sdk::{infer_schema, reconcile};

const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Oak</name>
      <ExtendedData>
        <Data name="Height"><value>12.5</value></Data>
        <Data name="Planted"><value>1901-04-01</value></Data>
      </ExtendedData>
      <Point><coordinates>-0.12,51.5,0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>Ash</name>
      <ExtendedData>
        <Data name="Height"><value>8</value></Data>
        <Data name="Planted"><value>unknown</value></Data>
      </ExtendedData>
      <Point><coordinates>-0.13,51.6,0</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#;

const GPX: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="survey" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="51.5" lon="-0.12"><ele>35</ele><name>Gate</name></wpt>
  <wpt lat="51.6" lon="-0.13"><ele>40</ele><name>Stile</name></wpt>
</gpx>"#;

#[test]
fn test_kml_fields_are_inferred_and_reconciled() {
    let result = import_file("trees.kml", None, KML.as_bytes(), &ReaderOptions::default()).unwrap();
    assert_eq!(result.format, DataFormat::Kml);
    assert_eq!(result.records.len(), 2);

    let fields = infer_schema(&result.records);
    let types: Vec<(&str, FieldType)> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.field_type))
        .collect();
    // One unparseable date downgrades the whole column
    assert_eq!(
        types,
        vec![
            ("name", FieldType::Text),
            ("Height", FieldType::Decimal),
            ("Planted", FieldType::Text),
        ]
    );

    let category = vec![
        FieldDefinition::new("name", FieldType::Text),
        FieldDefinition::new("height", FieldType::Decimal).with_name("Height"),
        FieldDefinition::new("planted", FieldType::Date),
        FieldDefinition::new("surveyor", FieldType::Text).required(),
    ];
    let reconciliation = reconcile(&fields, &category);

    let matched: Vec<(&str, &str)> = reconciliation
        .matched
        .iter()
        .map(|m| (m.source.as_str(), m.target.as_str()))
        .collect();
    assert_eq!(matched, vec![("name", "name"), ("Height", "height")]);
    assert_eq!(reconciliation.conflicts.len(), 1);
    assert_eq!(reconciliation.conflicts[0].target, "planted");
    assert_eq!(reconciliation.unfilled_target[0].key, "surveyor");
    assert!(!reconciliation.is_complete());

    let mapping = reconciliation.suggested_mapping();
    assert_eq!(mapping.target_for("Height"), Some("height"));
    assert_eq!(mapping.target_for("Planted"), None);
}

#[test]
fn test_gpx_detected_from_content() {
    let result = import_file("upload.xml", None, GPX.as_bytes(), &ReaderOptions::default()).unwrap();
    assert_eq!(result.format, DataFormat::Gpx);

    let fields = infer_schema(&result.records);
    let ele = fields.iter().find(|f| f.name == "ele").unwrap();
    assert_eq!(ele.field_type, FieldType::Integer);
    assert!(ele.candidate_types.contains(&FieldType::Decimal));
    assert_eq!(ele.non_null_count, 2);
}

#[test]
fn test_csv_with_wkt_geometry() {
    let csv = "name,geometry\nRiver,\"LINESTRING (-0.12 51.5, -0.13 51.6)\"\nPark,\"POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0))\"\n";
    let result = import_file("features.csv", None, csv.as_bytes(), &ReaderOptions::default()).unwrap();

    let kinds: Vec<&str> = result
        .records
        .iter()
        .map(|r| r.geometry.type_name())
        .collect();
    assert_eq!(kinds, vec!["LineString", "Polygon"]);
}

#[test]
fn test_reading_is_repeatable() {
    let options = ReaderOptions::default();
    let first = import_file("trees.kml", None, KML.as_bytes(), &options).unwrap();
    let second = import_file("trees.kml", None, KML.as_bytes(), &options).unwrap();
    assert_eq!(first.records, second.records);
}

#[test]
fn test_unsupported_and_empty_files() {
    let options = ReaderOptions::default();
    assert!(matches!(
        import_file("notes.txt", None, b"hello", &options),
        Err(ImportError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        import_file(
            "empty.geojson",
            None,
            br#"{"type": "FeatureCollection", "features": []}"#,
            &options
        ),
        Err(ImportError::ParseError(_))
    ));
}
