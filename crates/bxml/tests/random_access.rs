//! Random access over memory-mapped files.

use bxml::{
    BxmlFactory, BxmlReader, BxmlWriter, DecodeError, EncodingOptions, Error, ErrorCategory,
    EventType, ReaderOptions, Source, StreamReader, StreamWriter,
};
use tempfile::NamedTempFile;

const FEATURES: usize = 5;

/// Writes `FEATURES` features, each with a uniquely named child so that
/// every feature adds its own string-table fragment.
fn write_features(options: EncodingOptions) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut writer = StreamWriter::new(file.reopen().unwrap(), options).unwrap();
    writer.write_start_document().unwrap();
    writer.write_start_element("", "features").unwrap();
    for i in 0..FEATURES {
        writer.write_start_element("", "feature").unwrap();
        writer.write_attribute("", "id", &format!("f{i}")).unwrap();
        writer.write_start_element("", &format!("prop{i}")).unwrap();
        writer.write_values_double(&[i as f64, i as f64 + 0.5]).unwrap();
        writer.write_end_element().unwrap();
        writer.write_end_element().unwrap();
    }
    writer.write_end_document().unwrap();
    writer.into_inner().unwrap();
    file
}

fn indexed_options() -> EncodingOptions {
    EncodingOptions::default()
        .with_string_table_index(true)
        .with_index_path("//feature")
}

fn open_mapped(file: &NamedTempFile) -> impl BxmlReader {
    BxmlFactory::new()
        .create_reader(Source::open_mapped(file.path()).unwrap())
        .unwrap()
}

#[test]
fn test_index_positions_and_jumps() {
    let file = write_features(indexed_options());
    let mut reader = open_mapped(&file);
    assert!(reader.supports_random_access());
    assert!(reader.header().flags.has_random_access());
    assert_eq!(reader.indexed_paths(), vec!["//feature"]);
    let positions = reader.index_positions("//feature").unwrap().to_vec();
    assert_eq!(positions.len(), FEATURES);

    // Jump backwards through the features.
    for (i, &position) in positions.iter().enumerate().rev() {
        assert_eq!(reader.set_position(position).unwrap(), EventType::StartElement);
        assert_eq!(reader.name().unwrap().local_name, "feature");
        assert_eq!(reader.element_position().unwrap(), position);
        assert_eq!(reader.depth(), 1);
        let id = format!("f{i}");
        assert_eq!(reader.attribute_value("", "id").unwrap(), Some(id.as_str()));

        assert_eq!(reader.next().unwrap(), EventType::StartElement);
        assert_eq!(reader.name().unwrap().local_name, format!("prop{i}"));
        assert_eq!(reader.next().unwrap(), EventType::ValueDouble);
        let mut values = [0.0; 2];
        reader.get_double_values(&mut values).unwrap();
        assert_eq!(values, [i as f64, i as f64 + 0.5]);
        assert_eq!(reader.next().unwrap(), EventType::EndElement);
        assert_eq!(reader.next().unwrap(), EventType::EndElement);
        // The positioned element is read as a root.
        assert_eq!(reader.next().unwrap(), EventType::EndDocument);
    }
}

#[test]
fn test_sequential_read_after_preload() {
    let file = write_features(indexed_options());
    let mut reader = open_mapped(&file);
    let mut names = Vec::new();
    while reader.next_tag().unwrap() != EventType::EndDocument {
        if reader.event_type() == EventType::StartElement {
            names.push(reader.name().unwrap().local_name.clone());
        }
    }
    let mut expected = vec!["features".to_string()];
    for i in 0..FEATURES {
        expected.push("feature".into());
        expected.push(format!("prop{i}"));
    }
    assert_eq!(names, expected);
}

#[test]
fn test_element_position_then_return() {
    let file = write_features(EncodingOptions::default().with_string_table_index(true));
    let mut reader = open_mapped(&file);
    assert!(reader.indexed_paths().is_empty());
    reader.next_tag().unwrap();
    reader.next_tag().unwrap();
    let first = reader.element_position().unwrap();
    reader.skip_element().unwrap();
    reader.next_tag().unwrap();
    assert_eq!(reader.attribute_value("", "id").unwrap(), Some("f1"));

    assert_eq!(reader.set_position(first).unwrap(), EventType::StartElement);
    assert_eq!(reader.attribute_value("", "id").unwrap(), Some("f0"));
}

#[test]
fn test_set_position_must_land_on_an_element() {
    let file = write_features(indexed_options());
    let mut reader =
        StreamReader::open(Source::open_mapped(file.path()).unwrap(), ReaderOptions::default())
            .unwrap();
    let fragment = reader.trailer().unwrap().string_tables.as_ref().unwrap()[0].offset;
    let result = reader.set_position(fragment);
    assert!(matches!(
        result,
        Err(Error::Decode(DecodeError::NotAnElement { .. }))
    ));
}

#[test]
fn test_stream_source_has_no_random_access() {
    let file = write_features(indexed_options());
    let stream = std::fs::File::open(file.path()).unwrap();
    let mut reader = StreamReader::open(Source::from_reader(stream), ReaderOptions::default()).unwrap();
    assert!(!reader.supports_random_access());
    assert!(reader.trailer().is_none());
    reader.next().unwrap();
    let err = reader.element_position().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Capability);
    let err = reader.set_position(0).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Capability);

    // The contract layer reports the same misuse as a violation.
    let stream = std::fs::File::open(file.path()).unwrap();
    let mut checked = BxmlFactory::new()
        .create_reader(Source::from_reader(stream))
        .unwrap();
    checked.next().unwrap();
    assert!(checked.set_position(0).unwrap_err().is_contract_violation());
}

#[test]
fn test_trailer_indices() {
    let file = write_features(indexed_options());
    let reader =
        StreamReader::open(Source::open_mapped(file.path()).unwrap(), ReaderOptions::default())
            .unwrap();
    let trailer = reader.trailer().unwrap();
    let fragments = trailer.string_tables.as_ref().unwrap();
    // One fragment per new name: features, feature, id, then prop0..prop4.
    assert_eq!(fragments.len(), 3 + FEATURES);
    assert_eq!(fragments.iter().map(|f| f.count).sum::<u64>(), 3 + FEATURES as u64);
    let tables = trailer.index_tables.as_ref().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].path, "//feature");
}

#[test]
fn test_in_memory_random_access() {
    let file = write_features(indexed_options());
    let bytes = std::fs::read(file.path()).unwrap();
    let mut reader = BxmlFactory::new().create_reader(Source::from_bytes(bytes)).unwrap();
    let last = *reader.index_positions("//feature").unwrap().last().unwrap();
    reader.set_position(last).unwrap();
    assert_eq!(reader.attribute_value("", "id").unwrap(), Some("f4"));
}
