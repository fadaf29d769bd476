//! Function trait - 型付き function 呼び出しの定義
//!
//! task の `args` は位置引数の JSON 配列です。serde は struct を配列からも
//! デシリアライズできるので、`[12, "5b2f"]` を `CreatePdf { entry_id: 12,
//! pdf_id: "5b2f" }` としてそのまま受け取れます。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Binds a function name to the shape of its positional arguments.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Resize(u32, u32);
///
/// impl Function for Resize {
///     const NAME: &'static str = "resize";
/// }
/// ```
pub trait Function: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;

    /// Positional arguments as stored in a task.
    fn to_args(&self) -> Vec<serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Array(args)) => args,
            Ok(other) => vec![other],
            Err(_) => Vec::new(),
        }
    }
}

/// Render one PDF for an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePdf {
    pub entry_id: u64,
    pub pdf_id: String,
}

impl Function for CreatePdf {
    const NAME: &'static str = "create_pdf";

    fn to_args(&self) -> Vec<serde_json::Value> {
        vec![self.entry_id.into(), self.pdf_id.clone().into()]
    }
}

/// The notification a `send_notification` task delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Send a form notification with the entry's PDFs attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendNotification {
    pub form_id: u64,
    pub entry_id: u64,
    pub notification: Notification,
}

impl Function for SendNotification {
    const NAME: &'static str = "send_notification";

    fn to_args(&self) -> Vec<serde_json::Value> {
        let notification = serde_json::to_value(&self.notification).unwrap_or_default();
        vec![self.form_id.into(), self.entry_id.into(), notification]
    }
}

/// Remove the temporary PDFs of an entry once notifications went out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupPdfs {
    pub form_id: u64,
    pub entry_id: u64,
}

impl Function for CleanupPdfs {
    const NAME: &'static str = "cleanup_pdfs";

    fn to_args(&self) -> Vec<serde_json::Value> {
        vec![self.form_id.into(), self.entry_id.into()]
    }
}
