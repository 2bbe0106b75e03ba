use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgrel::qb::{Join, JoinKind, Order};
use pgrel::{Entity, Meta, Query, RelationData, Uuid};

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "artists")]
struct Artist {
    meta: Meta,
    name: String,
    #[orm(has_many = "artist_id")]
    albums: RelationData<Album>,
}

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "albums")]
struct Album {
    meta: Meta,
    artist_id: Option<Uuid>,
    title: String,
    year: i32,
}

/// `n` AND-ed comparisons followed by an OR group of `n` more.
fn build_query(n: usize) -> Query<Artist> {
    let mut q = Query::<Artist>::new();
    for i in 0..n {
        q = q.filter(&format!("col{i}"), "=", i as i64);
    }
    q.or_filter_group(|mut g| {
        for i in 0..n {
            g = g.or_filter(&format!("alt{i}"), ">", i as i64);
        }
        g
    })
    .order_by("name", Order::Asc)
    .take(50)
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/compile");

    for n in [1, 5, 10, 50, 100] {
        let q = build_query(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.build()));
        });
    }

    group.finish();
}

fn bench_build_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/build_and_compile");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_query(n).build()));
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/in_list");

    for n in [5, 20, 100, 500] {
        let keys: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            b.iter(|| {
                let q = Query::<Album>::new().filter_in("albums.artist_id", keys.clone());
                black_box(q.build());
            });
        });
    }

    group.finish();
}

fn bench_joins(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/joins");

    for n in [1, 4, 16] {
        let mut q = Query::<Artist>::new().join(Artist::albums().join(JoinKind::Left));
        for i in 0..n {
            q = q.join(
                Join::new(JoinKind::Inner, &format!("t{i}"))
                    .on(&format!("t{i}.artist_id"), "=", "artists.id")
                    .on_value(&format!("t{i}.rank"), "<", i as i64),
            );
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &q, |b, q| {
            b.iter(|| black_box(q.build()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_build_and_compile,
    bench_in_list,
    bench_joins
);
criterion_main!(benches);
