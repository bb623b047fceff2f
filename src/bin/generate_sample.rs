//! Generate a small synthetic field campaign: a united water-quality CSV,
//! a precipitation CSV and a ready-to-run `watertable.toml`, so the tool
//! can be tried without the real workbooks.

use std::fmt::Write as _;

use chrono::NaiveDate;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let sampling_dates: Vec<NaiveDate> = (0..6)
        .map(|i| NaiveDate::from_ymd_opt(2024, 1 + i, 15).unwrap())
        .collect();
    let depths = [0.5, 1.0, 2.0, 3.5, 5.0];
    let suffixes = ["EX1", "EX2", "01", "02", "03"];

    // united water-quality table
    let mut united = String::from("station,Date,Depths (m),EC (μS/cm),Nitrites (mg/L NO₂⁻)\n");
    let mut rows = 0usize;
    for site in 1..=3u8 {
        // EC baseline rises with site number, nitrites fall off with depth
        let ec_base = 500.0 + site as f64 * 150.0;
        for suffix in &suffixes {
            for (i, date) in sampling_dates.iter().enumerate() {
                let depth = depths[(i + suffixes.len()) % depths.len()];
                let ec = rng.gauss(ec_base + depth * 40.0, 25.0);
                let nitrite = rng.gauss(0.4 - depth * 0.05, 0.05).max(0.0);
                let nitrite_cell = if nitrite < 0.05 {
                    "<0.05".to_string()
                } else {
                    format!("{nitrite:.2}")
                };
                writeln!(
                    united,
                    "SS-{site:02}-{suffix},{date},{depth},{ec:.0},{nitrite_cell}",
                )
                .unwrap();
                rows += 1;
            }
        }
    }
    // a couple of rows the pipeline must drop, not choke on
    united.push_str("SS-01-01,2024-02-15,n/a,780,0.21\n");
    united.push_str("SS-02-01,2024-02-15,1.0,not measured,0.18\n");
    rows += 2;

    // daily precipitation with a few wet spells
    let mut precip = String::from("Date & Time [UTC],Precipitation\n");
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let mut precip_rows = 0usize;
    while day <= end {
        let amount = if rng.next_f64() < 0.25 {
            rng.gauss(6.0, 4.0).clamp(0.2, 20.0)
        } else {
            0.0
        };
        writeln!(precip, "{day} 00:00:00,{amount:.1}").unwrap();
        precip_rows += 1;
        day = day.succ_opt().unwrap();
    }

    let config = r#"output_dir = "plots"

[united]
path = "sample_united.csv"
promote_header = false
metrics = ["EC (μS/cm)", "Nitrites (mg/L NO₂⁻)"]

[precipitation]
path = "sample_precipitation.csv"
"#;

    std::fs::write("sample_united.csv", united).expect("writing sample_united.csv");
    std::fs::write("sample_precipitation.csv", precip).expect("writing sample_precipitation.csv");
    std::fs::write("watertable.toml", config).expect("writing watertable.toml");

    println!("Wrote {rows} water-quality rows and {precip_rows} precipitation days");
    println!("Run: cargo run -- watertable.toml");
}
