use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::StreamExt;
use netadapt::http::orderedheaders::OrderedHeaderMap;
use netadapt::http::requestbody::{encode, Body, EncodedBody};
use netadapt::http::{FileValue, Form, Part};

fn sample_parts(file: Bytes) -> Vec<Part> {
    let upload: netadapt::http::ByteStream =
        Box::pin(futures::stream::once(async move { Ok(file) }));
    vec![
        Part::new("title", "quarterly report"),
        Part::new("revision", 7),
        Part::new("tags", "finance,q3"),
        Part::file(
            "attachment",
            FileValue::new()
                .file(upload)
                .filename("report \"final\".csv")
                .mime("text/csv"),
        ),
    ]
}

fn benchmark_multipart_drain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let file = Bytes::from(vec![b'x'; 256 * 1024]);

    c.bench_function("multipart_drain_256k", |b| {
        b.to_async(&rt).iter(|| {
            let file = file.clone();
            async move {
                let mut form = Form::with_boundary("bench-boundary");
                for part in sample_parts(file) {
                    form.append(part);
                }
                let mut stream = form.finalize();
                let mut total = 0usize;
                while let Some(chunk) = stream.next().await {
                    total += chunk.unwrap().len();
                }
                black_box(total)
            }
        })
    });
}

fn benchmark_encode_fields(c: &mut Criterion) {
    c.bench_function("encode_fields_urlencoded", |b| {
        b.iter(|| {
            let mut headers = OrderedHeaderMap::new();
            let body = Body::fields([
                ("q", "rust http adapter"),
                ("page", "3"),
                ("lang", "en-GB"),
                ("filter", "a&b=c"),
            ]);
            match encode(black_box(body), &mut headers).unwrap() {
                EncodedBody::WriteOnce(bytes) => black_box(bytes.len()),
                _ => unreachable!(),
            }
        })
    });
}

criterion_group!(benches, benchmark_multipart_drain, benchmark_encode_fields);
criterion_main!(benches);
