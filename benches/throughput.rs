use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use rampart::dispatcher::{HandlerResponse, RequestContext};
use rampart::middleware::{RecoveryMiddleware, RequestIdMiddleware};
use rampart::router::Router;
use rampart::security::TokenService;
use std::hint::black_box;

fn ok(_: &mut RequestContext) -> HandlerResponse {
    HandlerResponse::no_content()
}

fn zoo_router() -> Router {
    let router = Router::new();
    router.get("/", ok).unwrap();
    router.get("/zoo/animals", ok).unwrap();
    router.post("/zoo/animals", ok).unwrap();
    router.get("/zoo/animals/:id", ok).unwrap();
    router.put("/zoo/animals/:id", ok).unwrap();
    router.patch("/zoo/animals/:id", ok).unwrap();
    router.delete("/zoo/animals/:id", ok).unwrap();
    router.get("/zoo/animals/:id/keepers/:keeper", ok).unwrap();
    for i in 0..200 {
        router.get(&format!("/filler/{i}/items/:item"), ok).unwrap();
    }
    router
}

fn bench_lookup(c: &mut Criterion) {
    let router = zoo_router();
    c.bench_function("lookup_literal", |b| {
        b.iter(|| router.lookup(black_box(&Method::GET), black_box("/zoo/animals")))
    });
    c.bench_function("lookup_two_params", |b| {
        b.iter(|| {
            router.lookup(
                black_box(&Method::GET),
                black_box("/zoo/animals/42/keepers/alice"),
            )
        })
    });
    c.bench_function("lookup_miss", |b| {
        b.iter(|| router.lookup(black_box(&Method::GET), black_box("/zoo/birds/1")))
    });
}

fn bench_handle(c: &mut Criterion) {
    let mut router = Router::new();
    router
        .use_middleware(RecoveryMiddleware::new())
        .use_middleware(RequestIdMiddleware::new());
    router.get("/zoo/animals/:id", ok).unwrap();

    c.bench_function("handle_with_middleware", |b| {
        b.iter(|| {
            let mut ctx = RequestContext::new(Method::GET, "/zoo/animals/7");
            black_box(router.handle(&mut ctx))
        })
    });
}

fn bench_token_validate(c: &mut Criterion) {
    let tokens = TokenService::new("bench-secret", chrono::Duration::hours(1));
    let token = tokens.issue("bench", None).unwrap();
    c.bench_function("token_validate", |b| {
        b.iter(|| tokens.validate(black_box(&token)))
    });
}

criterion_group!(benches, bench_lookup, bench_handle, bench_token_validate);
criterion_main!(benches);
