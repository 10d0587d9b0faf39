//! 診断結果集計ツール
//!
//! 使用方法: chart-aggregate <dbファイルパス> <写真ディレクトリ> <出力先ディレクトリ>

use chart_diag::aggregate::{self, ChartSummary};
use chart_diag::cli::AggregateArgs;
use chart_diag::config::Config;
use chart_diag::logging;
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;

const PROGRAM: &str = "chart-aggregate";

fn main() -> ExitCode {
    let args = match AggregateArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("引数エラー: {}", e.kind());
            eprintln!("使用方法: {} <dbファイルパス> <写真ディレクトリ> <出力先ディレクトリ>", PROGRAM);
            eprintln!("例: {} ./volumes/db/database.db ./volumes/photos ./output", PROGRAM);
            return ExitCode::FAILURE;
        }
    };
    logging::init(args.verbose);

    match aggregate::validate_args(&args.db, &args.photo_dir, &args.output_dir) {
        Ok(true) => println!("出力先ディレクトリを作成しました: {}", args.output_dir.display()),
        Ok(false) => {}
        Err(e) => {
            eprintln!("引数エラー: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match aggregate::aggregate(&args.db, &args.photo_dir, &args.output_dir, &config.photo_extension) {
        Ok(summaries) => {
            print_summary(&summaries);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("集計処理エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_summary(summaries: &[ChartSummary]) {
    println!("\n=== 集計完了 ===");
    for summary in summaries {
        println!("チャート '{}': {}件の結果を処理", summary.name, summary.results);
    }
}
