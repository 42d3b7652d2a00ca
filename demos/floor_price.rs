// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
use floorprice::collaborator::{
    MemoryEstimateSink, MemoryStateStore, MemoryTradeSource, run_cycle,
};
use floorprice::config::PredictorConfig;
use floorprice::predictor::Predictor;
use floorprice::trade::{CollectionId, Trade};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=floorprice=debug shows every estimate and adjustment.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = PredictorConfig::from_json_str(
        r#"{
            "controller": {
                "target_pct": 5.0,
                "initial_z": 5.0,
                "z_min": 2.0,
                "z_max": 10.0,
                "gain": 0.5
            },
            "estimation_window": { "max_trades": 140 },
            "backtest_window": { "max_trades": 800 },
            "backtest_every": 5
        }"#,
    )?;

    // Two synthetic collections: one quiet, one whose prices triple halfway.
    let collections = [
        (CollectionId::from("1:0xquiet"), 0.8_f64, None),
        (CollectionId::from("1:0xhyped"), 2.5_f64, Some(1_500_usize)),
    ];

    let mut source = MemoryTradeSource::new();
    let mut store = MemoryStateStore::new();
    let mut sink = MemoryEstimateSink::new();
    let mut predictors = Vec::new();
    let mut rng = StdRng::seed_from_u64(42);

    for (id, _, _) in &collections {
        predictors.push(Predictor::resume(id.clone(), config.clone(), &mut store)?);
    }

    for cycle in 0..150_u64 {
        let now_ms = (cycle + 1) * 60_000;
        for (id, base_eth, jump_at) in &collections {
            let batch = (0..20_u64).map(|offset| {
                let index = (cycle * 20 + offset) as usize;
                let regime = match jump_at {
                    Some(at) if index >= *at => 3.0,
                    _ => 1.0,
                };
                // Occasional wash trades far above the market.
                let wash = if rng.gen_bool(0.02) { 50.0 } else { 1.0 };
                let price = base_eth * regime * wash * rng.gen_range(0.7..1.6);
                Trade::new(price, cycle * 60_000 + offset * 3_000)
            });
            source.push(id, batch.collect::<Result<Vec<_>, _>>()?);
        }

        for predictor in &mut predictors {
            run_cycle(predictor, &mut source, &mut store, &mut sink, now_ms)?;
        }
    }

    for predictor in &predictors {
        let id = predictor.collection();
        if let Some(estimate) = sink.estimates(id).last() {
            println!(
                "Floor price estimate for {id} (in ETH): {:.4} at z={:.2} from {} trades",
                estimate.floor_price, estimate.z, estimate.sample_size
            );
        }
    }

    Ok(())
}
