use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gateway::model::Marshaller;
use gateway::service::{Catalog, RouteTable, BodyRoute, UrlTemplate};
use serde_json::{json, Value};
use std::sync::Arc;

fn marshaller() -> Marshaller {
    let catalog = Catalog::builtin("airavata").unwrap();
    Marshaller::new(Arc::new(catalog.registry().unwrap()))
}

/// A realistic experiment with `inputs` application inputs
fn experiment(inputs: usize) -> Value {
    let inputs: Vec<Value> = (0..inputs)
        .map(|i| {
            json!({
                "name": format!("Input-{i}"),
                "type": i % 5,
                "value": format!("airavata-dp://product-{i}"),
                "inputOrder": i,
                "isRequired": i % 2 == 0,
            })
        })
        .collect();
    json!({
        "experimentId": "Gaussian_abc123",
        "projectId": "Default_Project_xyz",
        "experimentName": "Gaussian on comet",
        "creationTime": "2024-01-02T03:04:05.000Z",
        "userConfigurationData": {
            "computationalResourceScheduling": {
                "resourceHostId": "comet.sdsc.edu",
                "totalCPUCount": 16,
                "queueName": "shared"
            }
        },
        "experimentInputs": inputs,
        "experimentStatus": [{"state": "EXECUTING", "timeOfStateChange": 1_700_000_000_000_i64}]
    })
}

fn bench_decode(c: &mut Criterion) {
    let marshaller = marshaller();
    let mut group = c.benchmark_group("decode_experiment");
    for inputs in [1, 10, 100] {
        let raw = experiment(inputs);
        group.bench_with_input(BenchmarkId::from_parameter(inputs), &raw, |b, raw| {
            b.iter(|| marshaller.decode("Experiment", black_box(raw)).unwrap())
        });
    }
    group.finish();
}

fn bench_encode_and_redecode(c: &mut Criterion) {
    let marshaller = marshaller();
    let model = marshaller.decode("Experiment", &experiment(10)).unwrap();

    c.bench_function("encode_experiment", |b| b.iter(|| black_box(&model).to_json()));
    c.bench_function("redecode_experiment", |b| {
        b.iter(|| marshaller.redecode(black_box(&model)).unwrap())
    });
    c.bench_function("clone_experiment", |b| b.iter(|| black_box(&model).clone()));
}

fn bench_route_resolution(c: &mut Criterion) {
    let route = RouteTable::new(
        UrlTemplate::parse("/api/user-storage/<path:path>"),
        vec![("experiment-id".to_string(), "experiment-id".to_string())],
        BodyRoute::None,
        true,
    );
    let params = json!({"path": "tmp/Gaussian run/output 1.log", "experiment-id": "Gaussian_abc123"});
    let params = params.as_object().unwrap().clone();

    c.bench_function("resolve_route", |b| b.iter(|| route.resolve(black_box(params.clone())).unwrap()));
}

criterion_group!(benches, bench_decode, bench_encode_and_redecode, bench_route_resolution);
criterion_main!(benches);
