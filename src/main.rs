use anyhow::Context;
use chart_diag::{cli, config, logging, play, save, store};
use chart_diag::photo_store::PhotoDir;
use chart_diag::run_file::RunFile;
use chart_diag_common::ChartDocument;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use store::{ChartStore, SqliteStore};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Compile { csv, output } => {
            let chart = compile_file(&csv)?;
            let json = serde_json::to_string_pretty(&chart)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("書き込みに失敗: {}", path.display()))?;
                    println!("✔ チャートJSONを保存: {}", path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Register { db, csv } => {
            let chart = compile_file(&csv)?;
            let store = SqliteStore::open(&db, config.max_charts)?;
            store::register_chart(&store, &chart)?;
            println!(
                "✔ チャート '{}' ({}) を登録しました（設問{}件・診断結果{}件）",
                chart.name,
                chart.chart_type,
                chart.questions.len(),
                chart.diagnoses.len()
            );
        }

        Commands::List { db } => {
            let store = SqliteStore::open(&db, config.max_charts)?;
            let records = store.list_records()?;
            if records.is_empty() {
                println!("登録済みのチャートはありません");
            }
            for record in records {
                println!("{}\t{}\t{}", record.id, record.name, record.chart_type);
            }
        }

        Commands::Delete { db, name } => {
            let store = SqliteStore::open(&db, config.max_charts)?;
            store::delete_chart(&store, &name)?;
            println!("✔ チャート '{}' を削除しました", name);
        }

        Commands::Play { db, photo_dir, name, photo, run_file } => {
            let store = SqliteStore::open(&db, config.max_charts)?;
            let photos = PhotoDir::new(photo_dir);
            let run_file = run_file
                .map(RunFile::new)
                .unwrap_or_else(|| RunFile::in_dir(std::path::Path::new(".")));
            play::run_interactive(&store, &photos, &name, photo.as_deref(), run_file, config.passphrase_length)?;
        }

        Commands::SaveRun { db, photo_dir, run } => {
            let json = std::fs::read_to_string(&run)
                .with_context(|| format!("読み込みに失敗: {}", run.display()))?;
            let store = SqliteStore::open(&db, config.max_charts)?;
            let photos = PhotoDir::new(photo_dir);
            let id = save::save_run_json(&store, &photos, &json, config.passphrase_length)?;
            println!("✔ 診断結果を保存しました (ID: {})", id);
        }

        Commands::Config { init } => {
            if init {
                config.save()?;
                println!("✔ 設定ファイルを作成しました: {}", Config::config_path()?.display());
            }
            println!("設定:");
            println!("  パスフレーズ長: {}", config.passphrase_length);
            println!("  チャート上限: {}", config.max_charts);
            println!("  写真の拡張子: {}", config.photo_extension);
        }
    }

    Ok(())
}

fn compile_file(path: &std::path::Path) -> anyhow::Result<ChartDocument> {
    let text = std::fs::read_to_string(path).with_context(|| format!("読み込みに失敗: {}", path.display()))?;
    chart_diag_common::compile(&text).with_context(|| format!("CSVのコンパイルに失敗: {}", path.display()))
}
