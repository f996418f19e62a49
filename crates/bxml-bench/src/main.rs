//! Benchmark for BXML encoding and decoding using synthetic map features.
//!
//! Each feature carries a name, a CRS attribute shared through the string
//! table, and a polyline of double coordinates.

use std::time::{Duration, Instant};

use bxml::{BxmlFactory, BxmlReader, BxmlWriter, EncodingOptions, EventType, Source};

const CRS: &str = "urn:ogc:def:crs:EPSG::4326";
const DECODE_ITERS: u32 = 10;

/// Deterministic coordinates so runs are comparable.
fn coordinates(feature: usize, points: usize) -> Vec<f64> {
    let mut state = (feature as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
    (0..points * 2)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 360_000) as f64 / 1000.0 - 180.0
        })
        .collect()
}

fn encode(features: usize, points: usize, options: EncodingOptions) -> Vec<u8> {
    let mut writer = BxmlFactory::new()
        .create_writer_with(Vec::new(), options)
        .expect("Failed to create writer");
    writer.write_start_document().expect("start document");
    writer.write_start_element("", "features").expect("root");
    let crs = writer.string_table_reference(CRS).expect("crs");
    for i in 0..features {
        writer.write_start_element("", "feature").expect("feature");
        writer.write_start_attribute("", "srsName").expect("attribute");
        writer.write_string_table_value(crs).expect("crs value");
        writer.write_end_attributes().expect("end attributes");

        writer.write_start_element("", "name").expect("name");
        writer.write_value_str(&format!("road {i}")).expect("name value");
        writer.write_end_element().expect("end name");

        writer.write_start_element("", "posList").expect("posList");
        writer
            .write_values_double(&coordinates(i, points))
            .expect("coordinates");
        writer.write_end_element().expect("end posList");
        writer.write_end_element().expect("end feature");
    }
    writer.write_end_document().expect("end document");
    writer
        .into_inner()
        .into_inner()
        .expect("Failed to finish stream")
}

/// Reads every event and value, returning the number of coordinates seen.
fn decode(bytes: &[u8]) -> usize {
    let mut reader = BxmlFactory::new()
        .create_reader(Source::from_bytes(bytes.to_vec()))
        .expect("Failed to read header");
    let mut coordinates = 0;
    let mut buffer = Vec::new();
    loop {
        match reader.next().expect("Failed to decode") {
            EventType::EndDocument => break,
            EventType::ValueDouble => {
                buffer.resize(reader.value_count().expect("count"), 0.0);
                reader.get_double_values(&mut buffer).expect("values");
                coordinates += buffer.len();
            }
            EventType::ValueString => {
                reader.get_string_value().expect("text");
            }
            _ => {}
        }
    }
    coordinates
}

fn throughput(bytes: usize, time: Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / time.as_secs_f64()
}

fn bench_decode(label: &str, bytes: &[u8], raw_len: usize, expected: usize) {
    for _ in 0..3 {
        decode(bytes);
    }
    let start = Instant::now();
    let mut seen = 0;
    for _ in 0..DECODE_ITERS {
        seen = decode(bytes);
    }
    let time = start.elapsed() / DECODE_ITERS;
    assert_eq!(seen, expected);

    println!(
        "\nDecode ({}): {:?} (avg of {} iterations)",
        label, time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s (uncompressed equivalent)",
        throughput(raw_len, time)
    );
}

fn main() {
    let features: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(50_000);
    let points: usize = std::env::args()
        .nth(2)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(16);

    println!("Features: {}, points per feature: {}", features, points);
    let expected = features * points * 2;

    // Uncompressed
    let encode_start = Instant::now();
    let encoded = encode(features, points, EncodingOptions::default());
    let encode_time = encode_start.elapsed();

    println!(
        "\nUncompressed: {} bytes in {:?}",
        encoded.len(),
        encode_time
    );
    println!(
        "  Throughput: {:.2} MB/s",
        throughput(encoded.len(), encode_time)
    );
    println!(
        "  Raw coordinate payload: {} bytes",
        expected * std::mem::size_of::<f64>()
    );

    // Indexed for random access
    let indexed_start = Instant::now();
    let indexed = encode(
        features,
        points,
        EncodingOptions::default()
            .with_string_table_index(true)
            .with_index_path("//feature"),
    );
    let indexed_time = indexed_start.elapsed();

    println!(
        "\nIndexed: {} bytes in {:?}",
        indexed.len(),
        indexed_time
    );
    println!(
        "  Index overhead: {} bytes",
        indexed.len() as i64 - encoded.len() as i64
    );

    // Compressed
    let compress_start = Instant::now();
    let compressed = encode(
        features,
        points,
        EncodingOptions::default().with_compressed(true),
    );
    let compress_time = compress_start.elapsed();

    println!(
        "\nCompressed (gzip): {} bytes in {:?}",
        compressed.len(),
        compress_time
    );
    println!(
        "  Compression ratio: {:.1}x",
        encoded.len() as f64 / compressed.len() as f64
    );
    println!(
        "  Throughput: {:.2} MB/s (uncompressed equivalent)",
        throughput(encoded.len(), compress_time)
    );

    bench_decode("uncompressed", &encoded, encoded.len(), expected);
    bench_decode("compressed", &compressed, encoded.len(), expected);

    // Random access: jump to every feature in reverse order.
    let mut reader = BxmlFactory::new()
        .create_reader(Source::from_bytes(indexed))
        .expect("Failed to read header");
    let positions = reader
        .index_positions("//feature")
        .expect("index table")
        .to_vec();
    assert_eq!(positions.len(), features);

    let jump_start = Instant::now();
    for &position in positions.iter().rev() {
        reader.set_position(position).expect("Failed to jump");
        reader.skip_element().expect("Failed to skip");
        assert_eq!(reader.next().expect("end"), EventType::EndDocument);
    }
    let jump_time = jump_start.elapsed();

    println!(
        "\nRandom access: {} jumps in {:?} ({:?} per jump)",
        positions.len(),
        jump_time,
        jump_time / positions.len().max(1) as u32
    );
}
