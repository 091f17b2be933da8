use chrono::{Duration, NaiveDate};

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

const CHANNELS: usize = 29;
const CAPTURES_PER_SET_POINT: usize = 10;
/// DAC output per step; 0.5 V is ~1230 °C through the 100 mV/V front end.
const SET_POINTS: [f64; 6] = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5];

fn main() {
    let mut rng = SimpleRng::new(42);

    // Each channel carries a small fixed offset plus capture noise.
    let offsets: Vec<f64> = (0..CHANNELS).map(|_| rng.gauss(0.0, 0.001)).collect();

    let mut header = vec![
        "InputRow".to_owned(),
        "Step".to_owned(),
        "Mode".to_owned(),
        "Note".to_owned(),
    ];
    for ch in 1..=CHANNELS {
        for suffix in ["InputRow", "MeasuredVolt", "ExpectedVolt", "Time"] {
            header.push(format!("TC{ch:02}{suffix}"));
        }
    }

    let output_path = "sample_calibration.csv";
    let mut writer = csv::Writer::from_path(output_path).expect("Failed to create output file");
    writer.write_record(&header).expect("Failed to write header");

    let start = NaiveDate::from_ymd_opt(2017, 8, 1)
        .and_then(|d| d.and_hms_opt(14, 57, 36))
        .expect("valid start time");

    let mut step = 0usize;
    for (group, &expected) in SET_POINTS.iter().enumerate() {
        let input_row = group + 1;
        for _ in 0..CAPTURES_PER_SET_POINT {
            let mut record = vec![
                input_row.to_string(),
                step.to_string(),
                "auto".to_owned(),
                String::new(),
            ];
            for (ch, offset) in offsets.iter().enumerate() {
                let stamp = start
                    + Duration::seconds(step as i64)
                    + Duration::milliseconds(ch as i64 * 7);
                let measured = expected + offset + rng.gauss(0.0, 0.0005);
                record.push(input_row.to_string());
                record.push(format!("{measured:.6}"));
                record.push(format!("{expected:.6}"));
                record.push(stamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string());
            }
            writer.write_record(&record).expect("Failed to write row");
            step += 1;
        }
    }
    writer.flush().expect("Failed to flush writer");

    println!(
        "Wrote {step} captures ({CHANNELS} channels, {} set points) to {output_path}",
        SET_POINTS.len()
    );
}
