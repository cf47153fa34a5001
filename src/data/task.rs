use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum TaskStatus {
    Draft,
    Assigned,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Draft
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Draft => write!(f, "Draft"),
            TaskStatus::Assigned => write!(f, "Assigned"),
        }
    }
}

/// Who receives the notification when a task gets assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskAudience {
    /// Every school is notified.
    Schools,
    /// Every student member of the listed classes is notified.
    Classes {
        #[serde(rename = "classIds", with = "super::uuid_binary::vec")]
        class_ids: Vec<Uuid>,
    },
}

impl Default for TaskAudience {
    fn default() -> Self {
        TaskAudience::Schools
    }
}

impl TaskAudience {
    pub fn includes_class(&self, class_id: Uuid) -> bool {
        match self {
            TaskAudience::Schools => true,
            TaskAudience::Classes { class_ids } => class_ids.contains(&class_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub topic: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub term: Option<u32>,
    #[serde(default)]
    pub week: Option<u32>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub audience: TaskAudience,
}

impl Task {
    pub fn new(topic: impl ToString, total_questions: u32, audience: TaskAudience) -> Task {
        Task {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            level: String::new(),
            status: TaskStatus::Draft,
            term: None,
            week: None,
            total_questions,
            audience,
        }
    }
}
