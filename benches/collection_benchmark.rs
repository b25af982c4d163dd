use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use excelgen::{build_from_collection, ColumnSchema, FieldKind, FieldValue};
use indexmap::IndexMap;

fn schema() -> ColumnSchema {
    ColumnSchema::builder()
        .column("id", "ID", 1)
        .column("name", "Name", 2)
        .kind(FieldKind::Text)
        .column("value", "Value", 3)
        .number_format_code("#,##0.00")
        .build()
        .unwrap()
}

fn records(size: usize) -> Vec<IndexMap<String, FieldValue>> {
    (0..size)
        .map(|i| {
            let mut record = IndexMap::new();
            record.insert("id".to_string(), FieldValue::Int(i as i64));
            record.insert("name".to_string(), FieldValue::Text(format!("Name_{}", i % 500)));
            record.insert("value".to_string(), FieldValue::Float(i as f64 * 1.25));
            record
        })
        .collect()
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_from_collection");
    let schema = schema();

    for size in [100, 1000, 10000, 100000].iter() {
        let data = records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let bytes = build_from_collection(data, &schema, "Data").unwrap();
                black_box(bytes);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_build);
criterion_main!(benches);
