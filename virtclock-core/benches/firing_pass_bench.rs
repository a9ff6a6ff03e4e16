#[macro_use]
extern crate criterion;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::Criterion;

use virtclock_core::{Clock, Ticker, VirtualClock};

fn bench_firing_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("firing_pass");

    for subscriptions in [16, 256, 4096] {
        group.throughput(criterion::Throughput::Elements(subscriptions as u64));
        group.bench_function(format!("tickers_{}", subscriptions), |b| {
            let clock = VirtualClock::new(Utc.timestamp_millis_opt(0).unwrap());
            let tickers: Vec<_> = (0..subscriptions)
                .map(|_| clock.new_ticker(Duration::from_millis(1)))
                .collect();
            let mut now = 0;
            b.iter(|| {
                now += 1;
                clock.set_timestamp(Utc.timestamp_millis_opt(now).unwrap());
                for ticker in &tickers {
                    ticker.c().try_recv().unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_firing_pass);
criterion_main!(benches);
