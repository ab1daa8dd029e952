use crate::mock::MockSpark;
use spark_batch::Batches;
use spark_config::BaseUrl;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Two chunks holding three records in total.
pub const RAW_STRING: &str = r#"
{
  "chunks": [
    {
      "id": "0001",
      "size": 2,
      "data": {
        "inputs": [
          ["sale_id", "price", "quantity"],
          [1, 20, 65],
          [2, 74, 73]
        ],
        "parameters": {"tax": 0.1}
      }
    },
    {
      "size": 1,
      "data": {
        "inputs": [
          ["sale_id", "price", "quantity"],
          [3, 20, 65]
        ],
        "summary": {
          "ignore_error": false,
          "aggregation": [{"output_name": "total", "operator": "SUM"}]
        }
      }
    }
  ]
}
"#;

pub fn base_url() -> BaseUrl {
    BaseUrl::parse("http://localhost:8080/my-tenant", None).expect("valid base url")
}

/// A `Batches` factory wired to `mock`.
pub fn spark(mock: MockSpark) -> (Arc<MockSpark>, Batches) {
    let mock = Arc::new(mock);
    let batches = Batches::new(base_url(), mock.clone());
    (mock, batches)
}

/// Writes `<dir>/<name>` with a `sale_id,price,quantity` header and `rows`
/// records.
pub fn write_sales_csv(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut content = String::from("sale_id,price,quantity\n");
    for i in 1..=rows {
        content.push_str(&format!("{i},{},{}\n", 10 + i, i % 7));
    }
    let path = dir.join(name);
    fs::write(&path, content).expect("write input csv");
    path
}

/// Data rows across every `*_output.csv` file of `dir`, headers excluded.
pub fn output_rows(dir: &Path) -> usize {
    fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_output.csv"))
        })
        .map(|path| {
            let content = fs::read_to_string(path).expect("read output csv");
            content.lines().count().saturating_sub(1)
        })
        .sum()
}
