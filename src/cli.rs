use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chart-admin")]
#[command(about = "診断チャートの登録・実施ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// CSVをチャートJSONに変換
    Compile {
        /// チャートCSVファイル
        #[arg(required = true)]
        csv: PathBuf,

        /// 出力JSONファイル（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// CSVをコンパイルしてデータベースに登録
    Register {
        /// データベースファイル
        #[arg(required = true)]
        db: PathBuf,

        /// チャートCSVファイル
        #[arg(required = true)]
        csv: PathBuf,
    },

    /// 登録済みチャートの一覧
    List {
        /// データベースファイル
        #[arg(required = true)]
        db: PathBuf,
    },

    /// チャートを削除
    Delete {
        /// データベースファイル
        #[arg(required = true)]
        db: PathBuf,

        /// チャート名
        #[arg(required = true)]
        name: String,
    },

    /// 登録済みチャートに対話的に回答して結果を保存
    Play {
        /// データベースファイル
        #[arg(required = true)]
        db: PathBuf,

        /// 写真ディレクトリ
        #[arg(required = true)]
        photo_dir: PathBuf,

        /// チャート名
        #[arg(required = true)]
        name: String,

        /// 撮影データ（JPEG）
        #[arg(short, long)]
        photo: Option<PathBuf>,

        /// 回答途中の状態ファイル（デフォルト: カレント/.chart-run.json）
        #[arg(long)]
        run_file: Option<PathBuf>,
    },

    /// 完了した回答セッションのJSONを保存
    SaveRun {
        /// データベースファイル
        #[arg(required = true)]
        db: PathBuf,

        /// 写真ディレクトリ
        #[arg(required = true)]
        photo_dir: PathBuf,

        /// 回答セッションJSONファイル
        #[arg(required = true)]
        run: PathBuf,
    },

    /// 設定を表示
    Config {
        /// 設定ファイルを既定値で作成
        #[arg(long)]
        init: bool,
    },
}

/// chart-aggregate の引数
#[derive(Parser, Debug)]
#[command(name = "chart-aggregate")]
#[command(about = "保存済みの診断結果をCSVと写真に書き出す", long_about = None)]
pub struct AggregateArgs {
    /// データベースファイル
    pub db: PathBuf,

    /// 写真ディレクトリ
    pub photo_dir: PathBuf,

    /// 出力先ディレクトリ
    pub output_dir: PathBuf,

    /// 詳細ログを出力
    #[arg(short, long)]
    pub verbose: bool,
}
