use entity_extractor::BaseEntity;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Make entity IDs unique across one extraction run.
///
/// The first entity holding an ID keeps it; later holders get a `_<hex8>`
/// suffix derived from their file and line, so reruns over the same files
/// assign the same IDs. Returns the number of renamed entities.
pub fn ensure_unique_ids(entities: &mut [BaseEntity]) -> usize {
    let mut taken: HashSet<String> = HashSet::with_capacity(entities.len());
    let mut renamed = 0;

    for entity in entities.iter_mut() {
        if taken.insert(entity.id.clone()) {
            continue;
        }

        let mut salt = 0u32;
        let new_id = loop {
            let candidate = format!("{}_{}", entity.id, collision_suffix(entity, salt));
            if taken.insert(candidate.clone()) {
                break candidate;
            }
            salt += 1;
        };
        log::warn!(
            "Duplicate entity id {} in {}:{}, renamed to {new_id}",
            entity.id,
            entity.file,
            entity.loc.start
        );
        entity.id = new_id;
        renamed += 1;
    }

    renamed
}

fn collision_suffix(entity: &BaseEntity, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.file.as_bytes());
    hasher.update(b":");
    hasher.update(entity.loc.start.to_string().as_bytes());
    if salt > 0 {
        hasher.update(b"#");
        hasher.update(salt.to_string().as_bytes());
    }
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}
