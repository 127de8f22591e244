//! CLI 모듈
//!
//! whoami-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::{EmbeddingBackend, RagConfig, VectorBackend};
use crate::embedding::has_api_key;
use crate::extractor::pdf::convert_pdf_to_text;
use crate::generation::has_openrouter_key;
use crate::knowledge::{Document, MetadataFilter, DEFAULT_DOC_TYPE};
use crate::pipeline::{Answer, IndexingReport, QueryOutcome, RagAssistant};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "whoami-rag")]
#[command(version, about = "개인 문서 기반 질의응답 RAG 어시스턴트", long_about = None)]
pub struct Cli {
    /// mock 언어 모델 사용 (API 호출 없음)
    #[arg(long, global = true)]
    pub mock: bool,

    /// 오프라인 모드 (해싱 임베딩 + 인메모리 저장소 + mock 모델)
    #[arg(long, global = true)]
    pub offline: bool,

    /// 오프라인 모드에서 시작 시 인덱싱할 문서 (PATH=TAG, 반복 가능)
    #[arg(long = "seed", global = true, value_name = "PATH=TAG")]
    pub seeds: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서를 인덱스에 추가
    Index {
        /// 인덱싱할 파일 경로
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 파일과 타입 쌍 (PATH=TAG, 반복 가능)
        #[arg(long = "doc", value_name = "PATH=TAG")]
        docs: Vec<String>,

        /// 인덱싱할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// --file, --dir 문서의 타입 태그
        #[arg(short = 't', long, default_value = DEFAULT_DOC_TYPE)]
        doc_type: String,

        /// PDF 파일 건너뛰기
        #[arg(long)]
        skip_pdfs: bool,
    },

    /// 한 번 질문하기
    Ask {
        /// 질문
        question: String,

        /// 문서 타입 필터
        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },

    /// 대화형 세션 (/clear: 기록 초기화, /exit: 종료)
    Chat {
        /// 문서 타입 필터
        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },

    /// 인덱스 검색 (답변 생성 없음)
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// 문서 타입 필터
        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },

    /// PDF를 텍스트 파일로 변환
    Convert {
        /// PDF 파일 경로
        pdf: PathBuf,

        /// 출력 파일 경로 (기본: 같은 이름의 .txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Index {
            ref file,
            ref docs,
            ref dir,
            ref doc_type,
            skip_pdfs,
        } => {
            let documents =
                resolve_documents(file.as_deref(), docs, dir.as_deref(), doc_type, skip_pdfs)?;
            let assistant = open_assistant(&config, &cli.seeds).await?;
            cmd_index(&assistant, &documents).await
        }
        Commands::Ask {
            ref question,
            ref doc_type,
        } => {
            let assistant = open_assistant(&config, &cli.seeds).await?;
            cmd_ask(&assistant, question, doc_type.as_deref()).await
        }
        Commands::Chat { ref doc_type } => {
            let assistant = open_assistant(&config, &cli.seeds).await?;
            cmd_chat(&assistant, doc_type.as_deref()).await
        }
        Commands::Search {
            ref query,
            limit,
            ref doc_type,
        } => {
            let assistant = open_assistant(&config, &cli.seeds).await?;
            cmd_search(&assistant, query, limit, doc_type.as_deref()).await
        }
        Commands::Convert {
            ref pdf,
            ref output,
        } => cmd_convert(pdf, output.as_deref()),
        Commands::Status => cmd_status(&config).await,
    }
}

/// 환경변수 설정 + 전역 플래그
fn build_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = RagConfig::from_env().context("설정 로드 실패")?;

    if cli.mock {
        config.generation.mock = true;
    }
    if cli.offline {
        config.embedding_backend = EmbeddingBackend::Hashing;
        config.vector_backend = VectorBackend::Memory;
        config.generation.mock = true;
    }

    config.validate().context("잘못된 설정")?;
    Ok(config)
}

/// 어시스턴트 구성 후 시드 문서 인덱싱
async fn open_assistant(config: &RagConfig, seeds: &[String]) -> Result<RagAssistant> {
    if config.embedding_backend == EmbeddingBackend::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는 --offline 으로 실행\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let assistant = RagAssistant::from_config(config)
        .await
        .context("RAG 파이프라인 초기화 실패")?;

    if assistant.is_degraded() {
        println!("[!] 벡터 인덱스를 열 수 없어 인메모리 저장소로 실행합니다 (저장되지 않음)");
    }

    if !seeds.is_empty() {
        let documents = seeds
            .iter()
            .map(|spec| parse_doc_spec(spec))
            .collect::<Result<Vec<_>>>()?;

        println!("[*] 시드 문서 {} 개 인덱싱 중...", documents.len());
        let report = assistant
            .index_documents(&documents)
            .await
            .context("시드 문서 인덱싱 실패")?;
        print_report(&report);
        println!();
    }

    Ok(assistant)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱싱 명령어 (index)
async fn cmd_index(assistant: &RagAssistant, documents: &[Document]) -> Result<()> {
    if documents.is_empty() {
        println!("[!] 인덱싱할 문서가 없습니다.");
        return Ok(());
    }

    println!(
        "[*] {} 개 문서 인덱싱 중 (임베딩: {}, 저장소: {})...",
        documents.len(),
        assistant.manager().embedder_name(),
        assistant.manager().store_name()
    );

    let report = assistant
        .index_documents(documents)
        .await
        .context("인덱싱 실패")?;
    print_report(&report);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(assistant: &RagAssistant, question: &str, doc_type: Option<&str>) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("질문이 비어 있습니다");
    }

    let filter = doc_type.map(MetadataFilter::doc_type);
    let mut session = assistant.new_session();

    println!("[*] 질문: \"{}\"", question);
    print_outcome(
        assistant
            .respond(&mut session, question, filter.as_ref())
            .await,
    );

    Ok(())
}

/// 대화형 세션 (chat)
async fn cmd_chat(assistant: &RagAssistant, doc_type: Option<&str>) -> Result<()> {
    let filter = doc_type.map(MetadataFilter::doc_type);
    let mut session = assistant.new_session();

    println!(
        "[OK] 대화를 시작합니다 (모델: {}). /clear 기록 초기화, /exit 종료",
        assistant.generator_name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().context("출력 실패")?;

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                session.clear();
                println!("[OK] 대화 기록을 초기화했습니다.");
            }
            question => {
                print_outcome(
                    assistant
                        .respond(&mut session, question, filter.as_ref())
                        .await,
                );
            }
        }
    }

    tracing::debug!("Chat session {} ended with {} turns", session.id(), session.len());
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    assistant: &RagAssistant,
    query: &str,
    limit: usize,
    doc_type: Option<&str>,
) -> Result<()> {
    if limit == 0 {
        bail!("--limit 은 1 이상이어야 합니다");
    }

    println!("[*] 검색 중: \"{}\"", query);

    let filter = doc_type.map(MetadataFilter::doc_type);
    let result = assistant
        .search(query, limit, filter.as_ref())
        .await
        .context("검색 실패")?;

    if result.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", result.len());

    for (i, hit) in result.hits.iter().enumerate() {
        let metadata = &hit.record.metadata;
        println!(
            "{}. [{}] {} (관련도: {:.1}%)",
            i + 1,
            metadata.doc_type,
            crate::knowledge::source_name(Path::new(&metadata.source_path)),
            hit.score * 100.0
        );
        println!("   청크: {}", hit.record.id);
        println!("   내용: {}", truncate_text(&metadata.text, 200));
        println!();
    }

    Ok(())
}

/// PDF 변환 명령어 (convert)
fn cmd_convert(pdf: &Path, output: Option<&Path>) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| pdf.with_extension("txt"));

    println!("[*] PDF 변환 중: {}", pdf.display());

    let chars = convert_pdf_to_text(pdf, &output).context("PDF 변환 실패")?;

    println!("[OK] {} 자를 저장했습니다: {}", chars, output.display());
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("whoami-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!(
        "[*] 청크: {} 자 (겹침 {}), top_k: {}",
        config.chunk.chunk_size, config.chunk.overlap, config.retrieval.top_k
    );
    println!(
        "[*] 임베딩: {:?} ({} 차원), 저장소: {:?}",
        config.embedding_backend, config.embedding_dimension, config.vector_backend
    );
    if config.generation.mock {
        println!("[*] 모델: mock");
    } else {
        println!("[*] 모델: {}", config.generation.model);
    }

    if has_api_key() {
        println!("[OK] Gemini API 키: 설정됨");
    } else {
        println!("[!] Gemini API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    if has_openrouter_key() {
        println!("[OK] OpenRouter API 키: 설정됨");
    } else {
        println!("[!] OpenRouter API 키: 미설정");
        println!("    설정: export OPENROUTER_API_KEY=your-key (또는 --mock)");
    }

    // 벡터 인덱스 상태 (임베딩 키가 필요 없는 경우에만 파이프라인 구성)
    if config.embedding_backend == EmbeddingBackend::Hashing || has_api_key() {
        let mut config = config.clone();
        config.generation.mock = true;
        match RagAssistant::from_config(&config).await {
            Ok(assistant) => match assistant.manager().count().await {
                Ok(count) => println!(
                    "[OK] 벡터 인덱스: {} 청크 ({})",
                    count,
                    assistant.manager().store_name()
                ),
                Err(e) => println!("[!] 벡터 통계 조회 실패: {}", e),
            },
            Err(e) => {
                tracing::debug!("Pipeline init failed: {}", e);
                println!("[!] 벡터 인덱스 열기 실패: {}", e.user_message());
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `PATH=TAG` 형식 파싱
fn parse_doc_spec(spec: &str) -> Result<Document> {
    let (path, doc_type) = spec
        .rsplit_once('=')
        .with_context(|| format!("'{}' 는 PATH=TAG 형식이 아닙니다", spec))?;

    let (path, doc_type) = (path.trim(), doc_type.trim());
    if path.is_empty() || doc_type.is_empty() {
        bail!("'{}' 에 경로 또는 타입이 비어 있습니다", spec);
    }

    Ok(Document::new(path, doc_type))
}

/// 인덱싱 대상 문서 목록
fn resolve_documents(
    file: Option<&Path>,
    docs: &[String],
    dir: Option<&Path>,
    doc_type: &str,
    skip_pdfs: bool,
) -> Result<Vec<Document>> {
    if file.is_none() && docs.is_empty() && dir.is_none() {
        bail!("--file, --doc, --dir 중 하나를 지정해야 합니다");
    }

    let mut documents = Vec::new();

    if let Some(path) = file {
        documents.push(Document::new(path, doc_type));
    }

    for spec in docs {
        documents.push(parse_doc_spec(spec)?);
    }

    if let Some(dir) = dir {
        let collector = FileCollector::new(CollectorConfig {
            skip_pdfs,
            ..Default::default()
        });
        let files = collector.collect_directory(dir)?;

        let stats = CollectionStats::from_files(&files);
        println!("[*] 수집 대상: {} 파일", stats.total_files);
        println!(
            "    PDF: {}, 텍스트: {}, 마크다운: {}",
            stats.pdf_files, stats.text_files, stats.markdown_files
        );
        println!("    총 크기: {}", format_bytes(stats.total_size as usize));
        println!();

        documents.extend(files.into_iter().map(|f| Document::new(f.path, doc_type)));
    }

    Ok(documents)
}

fn print_report(report: &IndexingReport) {
    for warning in &report.warnings {
        println!("[!] {}", warning);
    }
    for failure in &report.failures {
        println!("[!] 실패: {} - {}", failure.path.display(), failure.error);
    }
    println!(
        "[OK] 완료: 성공 {}, 실패 {} (청크 {}, 저장 {})",
        report.succeeded(),
        report.failures.len(),
        report.chunks,
        report.upserted
    );
}

fn print_outcome(outcome: QueryOutcome) {
    match outcome {
        QueryOutcome::Answered(answer) => print_answer(&answer),
        QueryOutcome::NoRelevantContext(answer) => {
            println!("[!] 관련 문서를 찾지 못했습니다.");
            print_answer(&answer);
        }
        QueryOutcome::CouldNotAnswer(e) => {
            println!("[!] 답변할 수 없습니다: {}", e.user_message());
        }
    }
}

fn print_answer(answer: &Answer) {
    println!("\n{}\n", answer.text.trim());

    if answer.sources.is_empty() {
        return;
    }
    println!("출처:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "  [{}] {} ({}, 관련도 {:.1}%)",
            i + 1,
            source.name(),
            source.doc_type,
            source.score * 100.0
        );
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
