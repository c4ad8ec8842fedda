use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use groupsnap_core::{GroupState, MediaItem};
use groupsnap_logging::{snap_debug, snap_info};

use crate::api::{ListingError, RemoteApi, RemoteMessage};

/// Attachment type collected from message history.
const IMAGE_ATTACHMENT: &str = "image";

/// Summary of a group visible to the token, for group pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

/// Walks the group's full message history and builds its download queue.
///
/// Pages are requested newest first; the cursor advances to the last message of
/// every page whether or not it carried media. A page shorter than the page
/// limit (including an empty or 304 page) ends the walk.
pub async fn build_media_list(
    api: &dyn RemoteApi,
    token: &str,
    group_id: &str,
) -> Result<GroupState, ListingError> {
    let group = api.group(token, group_id).await?;
    let mut state = GroupState::new(group_id, group.name.as_deref().unwrap_or(""), token);

    let page_limit = api.page_limit();
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut before_id: Option<String> = None;
    let mut page_index = 0usize;

    loop {
        let messages = api.messages(token, group_id, before_id.as_deref()).await?;
        page_index += 1;
        snap_debug!(
            "Group {} page {}: {} messages",
            group_id,
            page_index,
            messages.len()
        );

        if let Some(last) = messages.last() {
            before_id = Some(last.id.clone());
        }
        for message in &messages {
            collect_images(message, &mut seen, &mut items);
        }

        if messages.is_empty() || messages.len() < page_limit {
            break;
        }
    }

    state.extend_items(items);
    snap_info!(
        "Listed group {} ({}): {} pages, {} media items",
        group_id,
        state.group_name,
        page_index,
        state.pending_items.len()
    );
    Ok(state)
}

fn collect_images(message: &RemoteMessage, seen: &mut HashSet<String>, items: &mut Vec<MediaItem>) {
    let created = message
        .created_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    for attachment in &message.attachments {
        if attachment.kind != IMAGE_ATTACHMENT {
            continue;
        }
        let Some(url) = attachment.url.as_deref() else {
            continue;
        };
        if seen.insert(url.to_string()) {
            items.push(MediaItem::new(
                url,
                message.name.as_deref(),
                created,
                message.id.clone(),
            ));
        }
    }
}

/// Every group the token can see, in remote order.
pub async fn list_groups(
    api: &dyn RemoteApi,
    token: &str,
) -> Result<Vec<GroupSummary>, ListingError> {
    let page_limit = api.page_limit();
    let mut groups = Vec::new();
    let mut page = 1u32;
    loop {
        let batch = api.groups(token, page).await?;
        let count = batch.len();
        groups.extend(batch.into_iter().map(|group| GroupSummary {
            name: group.name.unwrap_or_else(|| group.id.clone()),
            id: group.id,
        }));
        if count == 0 || count < page_limit {
            break;
        }
        page += 1;
    }
    Ok(groups)
}
