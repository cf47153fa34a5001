//! Notification side effects of task publishing and reminders.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::data::task::TaskAudience;
use crate::error::EvalError;
use crate::eval::require_classes;
use crate::store::DirectoryStore;

pub mod reminder;
pub mod sync;

/// How audience resolution treats classes that no longer exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MissingClasses {
    Reject,
    Skip,
}

/// Receivers of a task notification, deduplicated and ordered.
pub(crate) async fn resolve_audience<S: DirectoryStore>(
    store: &S,
    audience: &TaskAudience,
    missing: MissingClasses,
) -> Result<Vec<Uuid>, EvalError> {
    let receivers: BTreeSet<Uuid> = match audience {
        TaskAudience::Schools => store.school_ids().await?.into_iter().collect(),
        TaskAudience::Classes { class_ids } => {
            let classes = match missing {
                MissingClasses::Reject => require_classes(store, class_ids).await?,
                MissingClasses::Skip => store.get_classes(class_ids).await?,
            };
            classes
                .iter()
                .flat_map(|class| class.roster())
                .map(|it| it.user_id)
                .collect()
        }
    };

    Ok(receivers.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class::{Class, ClassParticipant, School};
    use crate::error::Entity;
    use crate::store::MemoryStore;

    #[rocket::async_test]
    async fn class_audience_deduplicates_shared_students() {
        let store = MemoryStore::new();
        let shared = Uuid::new_v4();
        let mut first = Class::new("1a");
        first.participants = vec![
            ClassParticipant::student(shared, "Shared"),
            ClassParticipant::student(Uuid::new_v4(), "Only first"),
        ];
        let mut second = Class::new("1b");
        second.participants = vec![ClassParticipant::student(shared, "Shared")];
        let audience = TaskAudience::Classes {
            class_ids: vec![first.id, second.id],
        };
        store.insert_class(first);
        store.insert_class(second);

        let receivers = resolve_audience(&store, &audience, MissingClasses::Reject)
            .await
            .expect("audience resolves");
        assert_eq!(receivers.len(), 2);
        assert!(receivers.contains(&shared));
    }

    #[rocket::async_test]
    async fn school_audience_lists_every_school() {
        let store = MemoryStore::new();
        for name in ["North", "South"] {
            store.insert_school(School {
                id: Uuid::new_v4(),
                name: name.to_string(),
            });
        }

        let receivers = resolve_audience(&store, &TaskAudience::Schools, MissingClasses::Reject)
            .await
            .expect("audience resolves");
        assert_eq!(receivers.len(), 2);
    }

    #[rocket::async_test]
    async fn missing_class_is_rejected_or_skipped() {
        let store = MemoryStore::new();
        let audience = TaskAudience::Classes {
            class_ids: vec![Uuid::new_v4()],
        };

        let rejected = resolve_audience(&store, &audience, MissingClasses::Reject).await;
        assert!(matches!(
            rejected,
            Err(EvalError::NotFound {
                entity: Entity::Class,
                ..
            })
        ));

        let skipped = resolve_audience(&store, &audience, MissingClasses::Skip)
            .await
            .expect("missing classes are skipped");
        assert!(skipped.is_empty());
    }
}
