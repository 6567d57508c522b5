use criterion::{black_box, criterion_group, criterion_main, Criterion};
use syncnet::cookies::CookieStore;
use url::Url;

fn benchmark_cookie_insert(c: &mut Criterion) {
    let store = CookieStore::new();
    let url = Url::parse("https://www.example.com").unwrap();

    c.bench_function("cookie_parse_and_set", |b| {
        b.iter(|| {
            store.set(
                black_box(["foo=bar; Path=/; Max-Age=3600; Secure"]),
                black_box(&url),
            );
        })
    });
}

fn benchmark_cookie_header(c: &mut Criterion) {
    let store = CookieStore::new();
    let url = Url::parse("https://a.b.example.com/foo/bar").unwrap();
    // Pre-populate
    let lines: Vec<String> = (0..100).map(|i| format!("cookie{}=val{}; Path=/", i, i)).collect();
    store.set(lines, &url);

    c.bench_function("cookie_header_for_url", |b| {
        b.iter(|| {
            black_box(store.cookie_header(black_box(&url)));
        })
    });
}

criterion_group!(benches, benchmark_cookie_insert, benchmark_cookie_header);
criterion_main!(benches);
