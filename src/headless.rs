use std::fmt::Write as _;

use anyhow::{bail, Context, Result};

use crate::config::Cli;
use crate::data::export::to_delimited_bytes;
use crate::data::filter::{filter, QuerySpec, ResultSet};
use crate::data::loader::Loader;

/// Load, filter once, print, optionally export. Load errors end the run.
pub fn run(cli: &Cli, keyword: &str) -> Result<()> {
    let Some(query) = QuerySpec::new(keyword) else {
        bail!("--query needs a non-blank location keyword");
    };

    let mut loader = Loader::new(cli.loader_config());
    let provider = cli.provider(loader.config())?;
    let source = loader.load(&provider)?;
    println!("使用報價檔案：{}", source.source_name);

    let result = filter(&source.table, &query);
    if result.is_empty() {
        println!("查無符合「{}」的地點", query.keyword());
        return Ok(());
    }
    println!("找到 {} 筆符合「{}」的報價", result.len(), query.keyword());
    print!("{}", render_rows(&result));

    if let Some(path) = &cli.export {
        let bytes = to_delimited_bytes(&result)?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {} rows to {}", result.len(), path.display());
    }
    Ok(())
}

/// Tab-separated header plus rows.
fn render_rows(result: &ResultSet) -> String {
    let mut out = String::new();
    let header: Vec<String> = result.columns().iter().map(|c| c.to_string()).collect();
    let _ = writeln!(out, "{}", header.join("\t"));
    for row in result.rows() {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        let _ = writeln!(out, "{}", cells.join("\t"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{sample_table, SAMPLE_CSV};
    use clap::Parser;
    use std::ffi::OsString;
    use tempfile::TempDir;

    #[test]
    fn test_render_rows() {
        let result = filter(&sample_table(), &QuerySpec::new("台北").unwrap());
        assert_eq!(
            render_rows(&result),
            "載運數量\t8\t7\t6\t5\t4\t3\t2\t1\t低米數補貼\n台北市\t720\t630\t540\t450\t360\t270\t180\t90\t\n"
        );
    }

    #[test]
    fn test_run_writes_export() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("新報價2025.csv"), SAMPLE_CSV).unwrap();
        let out = tmp.path().join("宜蘭_報價.csv");
        let args: Vec<OsString> = vec![
            "quote-lookup".into(),
            "--dir".into(),
            tmp.path().into(),
            "--query".into(),
            "宜蘭".into(),
            "--export".into(),
            out.as_os_str().into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        run(&cli, "宜蘭").unwrap();
        let written = std::fs::read(&out).unwrap();
        assert!(written.starts_with(b"\xEF\xBB\xBF"));
        assert!(String::from_utf8_lossy(&written).contains("宜蘭市A,800"));
    }

    #[test]
    fn test_run_fails_without_source() {
        let tmp = TempDir::new().unwrap();
        let args: Vec<OsString> = vec!["quote-lookup".into(), "--dir".into(), tmp.path().into()];
        let cli = Cli::try_parse_from(args).unwrap();
        let err = run(&cli, "宜蘭").unwrap_err();
        assert!(err.to_string().contains("no file matching"));
        assert!(run(&cli, " ").is_err());
    }
}
