use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task;

use crate::error::{GridError, GridResult};
use crate::grid::engine::InferenceEngine;
use crate::grid::features::{load_features, looks_like_path};
use crate::grid::scanner::{ScanOutcome, Scanner};

/// 批量运行中一个输入的结果
#[derive(Debug)]
pub struct BatchItem {
    pub input: String,
    /// 该输入的文本诊断输出
    pub report: String,
    pub result: GridResult<ScanOutcome>,
}

/// 批量运行器
///
/// 每个输入在 tokio 的阻塞线程池上独立运行：各自创建引擎、缓冲区和输出文件，
/// 彼此之间不共享可变状态，一个输入失败不影响其他输入。
pub struct Gridsight<F> {
    scanner: Arc<Scanner>,
    factory: Arc<F>,
    output_dir: PathBuf,
}

impl<F> Gridsight<F> {
    /// # 参数
    /// * `scanner` - 共享的流水线设置
    /// * `factory` - 为每个输入创建一个新的推理引擎
    /// * `output_dir` - 调试位图输出目录，文件名由输入文件名和序号组成
    pub fn new(scanner: Scanner, factory: F, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            scanner: Arc::new(scanner),
            factory: Arc::new(factory),
            output_dir: output_dir.into(),
        }
    }

    /// 并行处理所有输入
    ///
    /// # 返回值
    /// 每个输入恰好一个结果，按输入顺序排列。任务异常退出时，该输入的结果为 `Inference` 错误。
    pub async fn scan_all<E>(&self, inputs: Vec<String>) -> Vec<BatchItem>
    where
        F: Fn() -> GridResult<E> + Send + Sync + 'static,
        E: InferenceEngine + 'static,
    {
        let mut handles = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let scanner = Arc::clone(&self.scanner);
            let factory = Arc::clone(&self.factory);
            let output_path = self.output_dir.join(output_name(&input, index));
            let task_input = input.clone();

            let handle = task::spawn_blocking(move || {
                let mut report = Vec::new();
                let result = load_features(&task_input).and_then(|features| {
                    let mut engine = (*factory)()?;
                    scanner.run_to(&mut engine, &features, &output_path, &mut report)
                });
                let report = String::from_utf8_lossy(&report).into_owned();
                BatchItem { input: task_input, report, result }
            });
            handles.push((input, handle));
        }

        let mut items = Vec::with_capacity(handles.len());
        for (input, handle) in handles {
            let item = match handle.await {
                Ok(item) => item,
                Err(e) => {
                    log::error!("批量任务异常退出 ({}): {}", input, e);
                    BatchItem {
                        input,
                        report: String::new(),
                        result: Err(GridError::Inference(format!("任务异常退出: {}", e))),
                    }
                }
            };
            items.push(item);
        }
        items
    }
}

/// 输出文件名总是以输入序号结尾，同名输入文件不会互相覆盖
fn output_name(input: &str, index: usize) -> String {
    let stem = looks_like_path(input)
        .then(|| Path::new(input).file_stem())
        .flatten()
        .map(|s| s.to_string_lossy().into_owned());
    match stem {
        Some(stem) => format!("{}-{}.bmp", stem, index),
        None => format!("input-{}.bmp", index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::grid::decode::{GridDecoder, GridVariant};
    use crate::grid::engine::ReplayEngine;
    use crate::grid::tensor::Tensor;

    fn replay() -> GridResult<ReplayEngine> {
        let mut scores = vec![0.0; 2 * 2 * 2];
        scores[1] = 0.8;
        Ok(ReplayEngine::new(
            Tensor::zeros(&[1, 16, 16, 1], None),
            Tensor::float(&[1, 2, 2, 2], scores)?,
        ))
    }

    fn scanner() -> Scanner {
        Scanner::new(256, GridDecoder::new(GridVariant::Binary))
    }

    #[test]
    fn output_names() {
        assert_eq!(output_name("data/frame_01.txt", 0), "frame_01-0.bmp");
        assert_eq!(output_name("0, 1, 2", 3), "input-3.bmp");
        assert_ne!(output_name("a/f.txt", 0), output_name("b/f.txt", 1));
        assert_ne!(output_name("input-1.txt", 0), output_name("0, 1", 1));
    }

    #[tokio::test]
    async fn each_input_runs_in_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let good = vec!["0.25"; 256].join(", ");
        let short = vec!["0.25"; 10].join(", ");
        let runner = Gridsight::new(scanner(), replay, dir.path());

        let items = runner.scan_all(vec![good.clone(), short, good]).await;
        assert_eq!(items.len(), 3);
        assert!(items[0].result.is_ok());
        assert!(matches!(items[1].result, Err(GridError::SizeMismatch { actual: 10, .. })));
        assert!(items[2].result.is_ok());
        assert!(dir.path().join("input-0.bmp").exists());
        assert!(!dir.path().join("input-1.bmp").exists());
        assert!(dir.path().join("input-2.bmp").exists());
        assert!(items[0].report.contains("Found 1 cube(s):"));
    }

    #[tokio::test]
    async fn inputs_with_the_same_file_name_keep_separate_bitmaps() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let features = vec!["0.5"; 256].join(", ");
        let mut inputs = Vec::new();
        for sub in ["a", "b"] {
            let sub_dir = data.path().join(sub);
            std::fs::create_dir(&sub_dir).unwrap();
            let path = sub_dir.join("f.txt");
            std::fs::write(&path, &features).unwrap();
            inputs.push(path.to_str().unwrap().to_string());
        }

        let runner = Gridsight::new(scanner(), replay, out.path());
        let items = runner.scan_all(inputs).await;

        let paths: Vec<PathBuf> = items
            .iter()
            .map(|item| item.result.as_ref().unwrap().output_path.clone())
            .collect();
        assert_ne!(paths[0], paths[1]);
        assert!(paths.iter().all(|p| p.exists()));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn panicking_task_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let calls = AtomicUsize::new(0);
        let factory = move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("engine construction failed");
            }
            replay()
        };
        let good = vec!["0.25"; 256].join(", ");
        let runner = Gridsight::new(scanner(), factory, dir.path());

        let items = runner.scan_all(vec![good.clone(), good.clone(), good]).await;
        assert_eq!(items.len(), 3);
        assert_eq!(items.iter().filter(|item| item.result.is_err()).count(), 1);
        assert!(items.iter().any(|item| matches!(item.result, Err(GridError::Inference(_)))));
    }
}
