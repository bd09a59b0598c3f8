//! Topic selection and output naming helpers.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::bag::ChannelInfo;

/// Message types that carry extractable images.
pub static IMAGE_TOPIC_TYPES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["sensor_msgs/Image", "sensor_msgs/CompressedImage"]));

/// Resolve the topic list to process.
///
/// With an explicit request, unknown topics are warned about and dropped and
/// the survivors keep their requested order. Without one, falls back to every
/// channel whose type is in `fallback_types` (all channels when `None`),
/// preserving the bag's enumeration order.
pub fn resolve_topics(
    requested: Option<&[String]>,
    channels: &[ChannelInfo],
    fallback_types: Option<&HashSet<&str>>,
) -> Vec<String> {
    match requested {
        Some(topics) if !topics.is_empty() => topics
            .iter()
            .filter(|t| {
                let known = channels.iter().any(|c| c.topic == **t);
                if !known {
                    tracing::warn!(topic = %t, "topic not in rosbag, skipping");
                }
                known
            })
            .cloned()
            .collect(),
        _ => channels
            .iter()
            .filter(|c| fallback_types.is_none_or(|types| types.contains(c.tp.as_str())))
            .map(|c| c.topic.clone())
            .collect(),
    }
}

/// Turn a topic name into a filesystem-safe directory/file prefix:
/// `/alphasense/cam0/image_raw` -> `alphasense_cam0_image_raw`.
pub fn sanitize_topic_name(topic: &str) -> String {
    topic.strip_prefix('/').unwrap_or(topic).replace('/', "_")
}

/// Zero-padded sequential image name, e.g. `000123.png`.
pub fn image_name_from_index(index: u64, file_format: &str, zero_padding: usize) -> String {
    format!("{index:0zero_padding$}.{file_format}")
}

/// Timestamp-based image name, e.g. `1649764528071146477.jpg`.
pub fn image_name_from_timestamp(timestamp_ns: u64, file_format: &str) -> String {
    format!("{timestamp_ns}.{file_format}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(topic: &str, tp: &str) -> ChannelInfo {
        ChannelInfo {
            id: 0,
            topic: topic.to_string(),
            tp: tp.to_string(),
            md5sum: String::new(),
            message_definition: String::new(),
            count: 0,
            first_ns: None,
            last_ns: None,
        }
    }

    #[test]
    fn sequential_name_is_zero_padded() {
        assert_eq!(image_name_from_index(123, "png", 6), "000123.png");
        assert_eq!(image_name_from_index(0, "jpg", 6), "000000.jpg");
    }

    #[test]
    fn timestamp_name_is_raw_nanoseconds() {
        assert_eq!(
            image_name_from_timestamp(1649764528071146477, "jpg"),
            "1649764528071146477.jpg"
        );
    }

    #[test]
    fn topic_name_sanitization() {
        assert_eq!(
            sanitize_topic_name("/alphasense/cam0/image_raw"),
            "alphasense_cam0_image_raw"
        );
        assert_eq!(sanitize_topic_name("plain"), "plain");
    }

    #[test]
    fn falls_back_to_image_typed_channels() {
        let channels = vec![
            channel("/imu", "sensor_msgs/Imu"),
            channel("/cam0", "sensor_msgs/Image"),
            channel("/cam1", "sensor_msgs/CompressedImage"),
        ];
        let resolved = resolve_topics(None, &channels, Some(&IMAGE_TOPIC_TYPES));
        assert_eq!(resolved, vec!["/cam0", "/cam1"]);

        // no fallback type filter means every channel
        let all = resolve_topics(None, &channels, None);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn unknown_requested_topics_are_dropped() {
        let channels = vec![channel("/cam0", "sensor_msgs/Image")];
        let requested = vec!["/does_not_exist".to_string(), "/cam0".to_string()];
        let resolved = resolve_topics(Some(&requested), &channels, Some(&IMAGE_TOPIC_TYPES));
        assert_eq!(resolved, vec!["/cam0"]);
    }

    #[test]
    fn empty_request_behaves_like_no_request() {
        let channels = vec![channel("/cam0", "sensor_msgs/Image")];
        let resolved = resolve_topics(Some(&[]), &channels, Some(&IMAGE_TOPIC_TYPES));
        assert_eq!(resolved, vec!["/cam0"]);
    }
}
