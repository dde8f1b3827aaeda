use crate::models::Segment;

/// Identify segments whose confidence falls below the threshold.
///
/// Segments with no reported confidence are treated as acceptable and never
/// flagged; an unknown score is not a failure.
pub fn identify_low_confidence(segments: &[Segment], threshold: f64) -> Vec<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, segment)| segment.confidence.is_some_and(|c| c < threshold))
        .map(|(i, _)| i)
        .collect()
}

/// Group segment indices into maximal runs of consecutive values.
///
/// Input order is irrelevant; output runs follow ascending index order.
pub fn group_adjacent(indices: &[usize]) -> Vec<Vec<usize>> {
    if indices.is_empty() {
        return Vec::new();
    }

    let mut sorted = indices.to_vec();
    sorted.sort_unstable();

    let mut groups = Vec::new();
    let mut current = vec![sorted[0]];

    for &index in &sorted[1..] {
        if index == current[current.len() - 1] + 1 {
            current.push(index);
        } else {
            groups.push(std::mem::replace(&mut current, vec![index]));
        }
    }
    groups.push(current);

    groups
}
