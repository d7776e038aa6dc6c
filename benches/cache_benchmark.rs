use bytes::Bytes;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{seq::SliceRandom, thread_rng, Rng};
use ride_compare::{CacheKey, CacheStore, ComparisonType, MemoryStore};
use std::sync::Arc;
use std::thread;

fn keys(cities: &[String]) -> Vec<CacheKey> {
    let mut keys = Vec::new();
    for (i, city) in cities.iter().enumerate() {
        keys.push(CacheKey::Airport { city: city.clone() });
        keys.push(CacheKey::Geocode { city: city.clone() });
        for comparison in [ComparisonType::Price, ComparisonType::Eta] {
            keys.push(CacheKey::Price {
                city: city.clone(),
                comparison,
                start_lat: 30.0 + i as f64 / 100.0,
            });
        }
    }
    keys
}

// Mixed reads and writes from several threads, as overlapping batch runs do
pub fn cache_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store");

    for city_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(city_count),
            city_count,
            |b, &city_count| {
                let cities: Vec<String> = (0..city_count).map(|i| format!("city{}", i)).collect();
                let keys = Arc::new(keys(&cities));

                let mut rng = thread_rng();
                let payload = Bytes::from((0..1024).map(|_| rng.gen::<u8>()).collect::<Vec<_>>());

                b.iter(|| {
                    let cache = Arc::new(MemoryStore::new());
                    let mut handles = vec![];

                    for _ in 0..4 {
                        let cache = Arc::clone(&cache);
                        let keys = Arc::clone(&keys);
                        let payload = payload.clone();

                        handles.push(thread::spawn(move || {
                            let mut rng = thread_rng();
                            for _ in 0..250 {
                                let key = keys.choose(&mut rng).unwrap();
                                if rng.gen_bool(0.3) {
                                    cache.put(key, payload.clone(), Utc::now());
                                } else {
                                    let _ = cache.get(key);
                                }
                            }
                        }));
                    }

                    for handle in handles {
                        handle.join().unwrap();
                    }

                    black_box(cache.stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, cache_benchmark);
criterion_main!(benches);
