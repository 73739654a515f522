use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const CITIES: [&str; 4] = ["NYC", "LA", "Chicago", "Boston"];
const DEPARTMENTS: [&str; 3] = ["Sales", "Engineering", "Support"];
const NAMES: [&str; 8] = [
    "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Heidi",
];

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

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// One clean employee record.
#[derive(Clone)]
struct Employee {
    name: String,
    age: i64,
    experience: i64,
    salary: f64,
    city: &'static str,
    department: &'static str,
}

fn generate(rng: &mut SimpleRng, n: usize) -> Vec<Employee> {
    (0..n)
        .map(|i| {
            let age = rng.gauss(40.0, 9.0).clamp(21.0, 65.0).round() as i64;
            let experience = ((age - 21) as f64 * rng.next_f64()).round() as i64;
            let salary = (35_000.0 + 2_500.0 * experience as f64 + rng.gauss(0.0, 4_000.0)).round();
            Employee {
                name: format!("{} {}", rng.pick(&NAMES), i),
                age,
                experience,
                salary,
                city: rng.pick(&CITIES),
                department: rng.pick(&DEPARTMENTS),
            }
        })
        .collect()
}

/// Messy CSV: padded strings, gaps, exact duplicates and a few absurd ages.
fn write_messy_csv(path: &Path, employees: &[Employee], rng: &mut SimpleRng) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record(["name", "age", "experience", "salary", "city", "department"])?;

    let mut rows = 0;
    for e in employees {
        let pad = |s: &str, rng: &mut SimpleRng| {
            if rng.chance(0.2) {
                format!("  {s} ")
            } else {
                s.to_string()
            }
        };
        let age = if rng.chance(0.05) {
            String::new()
        } else if rng.chance(0.03) {
            (e.age + 100).to_string()
        } else {
            e.age.to_string()
        };
        let city = if rng.chance(0.04) {
            String::new()
        } else {
            pad(e.city, rng)
        };
        let record = [
            pad(&e.name, rng),
            age,
            e.experience.to_string(),
            format!("{:.1}", e.salary),
            city,
            e.department.to_string(),
        ];

        let copies = if rng.chance(0.05) { 2 } else { 1 };
        for _ in 0..copies {
            writer.write_record(&record)?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// Clean Parquet copy of the same records.
fn write_parquet(path: &Path, employees: &[Employee]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
        Field::new("experience", DataType::Int64, false),
        Field::new("salary", DataType::Float64, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("department", DataType::Utf8, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(employees.iter().map(|e| e.name.as_str()))),
        Arc::new(Int64Array::from_iter_values(employees.iter().map(|e| e.age))),
        Arc::new(Int64Array::from_iter_values(employees.iter().map(|e| e.experience))),
        Arc::new(Float64Array::from_iter_values(employees.iter().map(|e| e.salary))),
        Arc::new(StringArray::from_iter_values(employees.iter().map(|e| e.city))),
        Arc::new(StringArray::from_iter_values(employees.iter().map(|e| e.department))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = Path::new("data");
    std::fs::create_dir_all(out_dir).context("creating data directory")?;

    let mut rng = SimpleRng::new(42);
    let employees = generate(&mut rng, 200);

    let csv_path = out_dir.join("messy_data.csv");
    let rows = write_messy_csv(&csv_path, &employees, &mut rng)?;
    log::info!("Wrote {rows} rows to {}", csv_path.display());

    let parquet_path = out_dir.join("sample.parquet");
    write_parquet(&parquet_path, &employees)?;
    log::info!("Wrote {} rows to {}", employees.len(), parquet_path.display());

    println!("Sample data written to {}/", out_dir.display());
    Ok(())
}
