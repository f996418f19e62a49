//! Prints the event stream of a BXML file.

use bxml::{BxmlFactory, BxmlReader, EventType, Source};

fn preview(text: &str) -> String {
    let head: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        format!("\"{}...\"", head)
    } else {
        format!("\"{}\"", head)
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/sample.bxml".to_string());

    println!("Reading: {}", path);

    let source = Source::open_mapped(&path).expect("Failed to open file");
    let mut reader = BxmlFactory::new()
        .create_reader(source)
        .expect("Failed to read header");

    let header = reader.header();
    println!("\n=== Header ===");
    println!("Version: {}", header.version);
    println!("Charset: {:?}", header.charset);
    println!("Byte order: {:?}", header.byte_order());
    println!("Compression: {:?}", header.compression);
    if let Some(version) = reader.xml_version() {
        println!("XML version: {}", version);
    }

    let paths = reader.indexed_paths();
    if !paths.is_empty() {
        println!("\n=== Index Tables ===");
        for path in paths {
            let hits = reader.index_positions(path).map_or(0, <[u64]>::len);
            println!("  {} ({} elements)", path, hits);
        }
    }

    println!("\n=== Events ===");
    let mut elements = 0usize;
    let mut values = 0usize;
    loop {
        let event = reader.next().expect("Failed to decode");
        let indent = "  ".repeat(reader.depth());
        match event {
            EventType::EndDocument => break,
            EventType::StartElement => {
                elements += 1;
                let name = reader.name().expect("element name").to_string();
                println!("{}<{}>", indent, name);
                for i in 0..reader.namespace_count().unwrap_or(0) {
                    let ns = reader.namespace_decl(i).expect("namespace");
                    println!("{}  xmlns:{} = {}", indent, ns.prefix, ns.uri);
                }
                for i in 0..reader.attribute_count().unwrap_or(0) {
                    let attribute = reader.attribute(i).expect("attribute");
                    println!("{}  @{} = {}", indent, attribute.name, preview(&attribute.value));
                }
            }
            EventType::EndElement => {
                println!("{}</{}>", indent, reader.name().expect("element name"));
            }
            EventType::Comment => {
                let text = reader.get_string_value().expect("comment");
                println!("{}<!-- {} -->", indent, preview(&text));
            }
            other => {
                values += 1;
                let count = reader.value_count().unwrap_or(1);
                let text = reader.get_string_value().expect("value");
                println!("{}{} [{}] {}", indent, other, count, preview(&text));
            }
        }
    }

    println!("\n=== Summary ===");
    println!("Elements: {}", elements);
    println!("Value events: {}", values);
}
