use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassRole {
    Student,
    Assistant,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassParticipant {
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    pub class_role: ClassRole,
    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn visible_default() -> bool {
    true
}

impl ClassParticipant {
    pub fn student(user_id: Uuid, display_name: impl ToString) -> ClassParticipant {
        ClassParticipant {
            user_id,
            display_name: display_name.to_string(),
            class_role: ClassRole::Student,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub name: String,
    #[serde(default, with = "crate::data::uuid_binary::option")]
    pub school_id: Option<Uuid>,

    #[serde(default)]
    pub participants: Vec<ClassParticipant>,
}

impl Class {
    pub fn new(name: impl ToString) -> Class {
        Class {
            id: Uuid::new_v4(),
            name: name.to_string(),
            school_id: None,
            participants: vec![],
        }
    }

    /// Participants that are expected to submit answers.
    pub fn roster(&self) -> impl Iterator<Item = &ClassParticipant> {
        self.participants
            .iter()
            .filter(|it| it.class_role == ClassRole::Student)
    }

    pub fn roster_size(&self) -> usize {
        self.roster().count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    #[serde(rename = "_id", with = "bson::serde_helpers::uuid_1_as_binary")]
    pub id: Uuid,
    pub name: String,
}
