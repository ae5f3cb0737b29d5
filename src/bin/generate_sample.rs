use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

const LOCATIONS: &[&str] = &[
    "宜蘭市",
    "宜蘭縣頭城鎮",
    "宜蘭縣羅東鎮",
    "宜蘭縣蘇澳鎮",
    "台北市",
    "新北市板橋區",
    "新北市淡水區",
    "基隆市",
    "桃園市",
    "新竹市",
    "苗栗縣",
    "台中市",
    "彰化縣",
    "南投縣",
    "雲林縣",
    "嘉義市",
    "台南市",
    "高雄市",
    "屏東縣",
    "花蓮市",
    "台東市",
];

/// Write a deterministic sample price list (CSV with BOM plus Parquet).
#[derive(Debug, Parser)]
struct Args {
    /// Output folder.
    #[arg(default_value = ".")]
    out_dir: PathBuf,

    /// Year used in the file name, e.g. 新報價2025.csv.
    #[arg(long, default_value_t = 2025)]
    year: u32,
}

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

    /// Uniform integer in `lo..hi`.
    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo) as u64) as i64
    }
}

/// One row: per-unit price for tiers 1..=8 (smaller loads cost more per
/// unit) and a subsidy for short hauls.
struct QuoteRow {
    location: &'static str,
    tiers: [i64; 8],
    subsidy: Option<i64>,
}

fn generate_rows(rng: &mut SimpleRng) -> Vec<QuoteRow> {
    LOCATIONS
        .iter()
        .map(|&location| {
            let base = rng.range(60, 160) * 10;
            let mut tiers = [0i64; 8];
            for (i, price) in tiers.iter_mut().enumerate() {
                let surcharge = (8 - i as i64 - 1) * rng.range(4, 9);
                *price = ((base * (100 + surcharge)) / 100 / 10) * 10;
            }
            let subsidy = (base < 1000).then(|| rng.range(2, 8) * 50);
            QuoteRow {
                location,
                tiers,
                subsidy,
            }
        })
        .collect()
}

fn write_csv(path: &Path, rows: &[QuoteRow]) -> Result<()> {
    let mut buf = b"\xEF\xBB\xBF".to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        let mut header = vec!["載運數量".to_string()];
        header.extend((1..=8).map(|t: u8| t.to_string()));
        header.push("低米數補貼".to_string());
        writer.write_record(&header)?;

        for row in rows {
            let mut record = vec![row.location.to_string()];
            record.extend(row.tiers.iter().map(|p| p.to_string()));
            record.push(row.subsidy.map(|s| s.to_string()).unwrap_or_default());
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    std::fs::write(path, buf).with_context(|| format!("writing {}", path.display()))
}

fn write_parquet(path: &Path, rows: &[QuoteRow]) -> Result<()> {
    let mut fields = vec![Field::new("載運數量", DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        rows.iter().map(|r| r.location).collect::<Vec<_>>(),
    ))];
    for tier in 0..8 {
        fields.push(Field::new((tier + 1).to_string(), DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(
            rows.iter().map(|r| r.tiers[tier]).collect::<Vec<_>>(),
        )));
    }
    fields.push(Field::new("低米數補貼", DataType::Int64, true));
    arrays.push(Arc::new(Int64Array::from(
        rows.iter().map(|r| r.subsidy).collect::<Vec<_>>(),
    )));

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let csv_path = args.out_dir.join(format!("新報價{}.csv", args.year));
    let parquet_path = args.out_dir.join(format!("新報價{}.parquet", args.year));

    write_csv(&csv_path, &rows)?;
    write_parquet(&parquet_path, &rows)?;

    println!(
        "Wrote {} locations to {} and {}",
        rows.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
