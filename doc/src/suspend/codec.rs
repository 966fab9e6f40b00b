//! Binary encoding of detached subtrees.
//!
//! A buffer holds one bincode record with fixed-width little-endian
//! integers: the subtree root, then a `u64` count and the owned entities.
//! Every entity is `u32 id | u32 version | u32 variant | payload`, listed
//! owner before owned in the order the subtree is walked:
//!
//! - a layer lists its cels (image layer) or child layers (group)
//! - a cel lists its image
//! - a frame lists every cel of the subtree, each followed by its image
//!
//! Sprites are never suspended. This is an in-memory format only: it is not
//! versioned and never written to disk.

use std::collections::{BTreeMap, HashSet};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::graph::{LayerContent, Object, ObjectData, ObjectId, ObjectKind, Subtree};

use super::error::{SuspendError, SuspendResult};

#[derive(Serialize, Deserialize)]
struct Records<T> {
    root: T,
    owned: Vec<T>,
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Encodes `subtree`, root first.
///
/// Fails if the subtree holds a sprite, references an entity it does not
/// contain, or contains entities not reachable from its root.
pub(crate) fn encode(subtree: &Subtree) -> SuspendResult<Vec<u8>> {
    let order = Walk::run(subtree.iter().map(|o| (o.id, o)).collect(), subtree.root())?;
    let (root, owned) = order
        .split_first()
        .ok_or(SuspendError::MissingObject(subtree.root()))?;
    let records = Records {
        root: *root,
        owned: owned.to_vec(),
    };
    options()
        .serialize(&records)
        .map_err(|e| SuspendError::Format(e.to_string()))
}

/// Decodes a buffer produced by [`encode`]. The root comes first in the
/// returned list.
pub(crate) fn decode(bytes: &[u8]) -> SuspendResult<Vec<Object>> {
    let mut rest = bytes;
    let records: Records<Object> = options()
        .with_limit(bytes.len() as u64)
        .deserialize_from(&mut rest)
        .map_err(decode_error)?;
    if !rest.is_empty() {
        return Err(SuspendError::TrailingBytes(rest.len()));
    }

    let mut objects = Vec::with_capacity(records.owned.len() + 1);
    objects.push(records.root);
    objects.extend(records.owned);

    let mut by_id = BTreeMap::new();
    for object in &objects {
        if by_id.insert(object.id, object).is_some() {
            return Err(SuspendError::Duplicate(object.id));
        }
    }
    let order = Walk::run(by_id, objects[0].id)?;
    if !order.iter().map(|o| o.id).eq(objects.iter().map(|o| o.id)) {
        return Err(SuspendError::Inconsistent(
            "records are not listed owner before owned".into(),
        ));
    }
    Ok(objects)
}

fn decode_error(e: bincode::Error) -> SuspendError {
    match *e {
        bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            SuspendError::Truncated
        }
        bincode::ErrorKind::SizeLimit => SuspendError::Truncated,
        other => SuspendError::Format(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Ownership walk
// ---------------------------------------------------------------------------

/// Visits a subtree from its root, owner before owned, and checks that every
/// owned entity exists, has the expected kind and points back at its owner.
struct Walk<'a> {
    objects: BTreeMap<ObjectId, &'a Object>,
    order: Vec<&'a Object>,
    seen: HashSet<ObjectId>,
}

impl<'a> Walk<'a> {
    fn run(
        objects: BTreeMap<ObjectId, &'a Object>,
        root: ObjectId,
    ) -> SuspendResult<Vec<&'a Object>> {
        let total = objects.len();
        let mut walk = Self {
            objects,
            order: Vec::with_capacity(total),
            seen: HashSet::with_capacity(total),
        };
        walk.visit(root)?;
        if walk.order.len() != total {
            return Err(SuspendError::Inconsistent(format!(
                "{} of {total} entities are not reachable from {root}",
                total - walk.order.len()
            )));
        }
        Ok(walk.order)
    }

    fn get(&self, id: ObjectId) -> SuspendResult<&'a Object> {
        self.objects
            .get(&id)
            .copied()
            .ok_or(SuspendError::MissingObject(id))
    }

    fn visit(&mut self, id: ObjectId) -> SuspendResult<()> {
        let object = self.get(id)?;
        if !self.seen.insert(id) {
            return Err(SuspendError::Duplicate(id));
        }
        self.order.push(object);

        match &object.data {
            ObjectData::Sprite(_) => return Err(SuspendError::NotSuspendable(ObjectKind::Sprite)),
            ObjectData::Layer(layer) => match &layer.content {
                LayerContent::Image { cels } => {
                    for &cel in cels {
                        self.visit_child(cel, ObjectKind::Cel, Some(id))?;
                    }
                }
                LayerContent::Group { children } => {
                    for &child in children {
                        self.visit_child(child, ObjectKind::Layer, Some(id))?;
                    }
                }
            },
            ObjectData::Cel(cel) => {
                if !cel.image.is_null() {
                    self.visit_child(cel.image, ObjectKind::Image, None)?;
                }
            }
            ObjectData::Image(image) => {
                let expected =
                    image.width as usize * image.height as usize * image.format.bytes_per_pixel();
                if image.pixels.len() != expected {
                    return Err(SuspendError::Inconsistent(format!(
                        "image {id} holds {} bytes, {}x{} {:?} needs {expected}",
                        image.pixels.len(),
                        image.width,
                        image.height,
                        image.format
                    )));
                }
            }
            ObjectData::Frame(_) => {
                let cels: Vec<ObjectId> = self
                    .objects
                    .values()
                    .filter(|o| o.kind() == ObjectKind::Cel)
                    .map(|o| o.id)
                    .collect();
                for cel in cels {
                    self.visit_child(cel, ObjectKind::Cel, None)?;
                }
            }
            ObjectData::Tag(_) | ObjectData::Slice(_) | ObjectData::Palette(_) => {}
        }
        Ok(())
    }

    /// Visits an owned entity. With `owner` set, the child must point back at
    /// it through its `layer` (cels) or `parent` (layers) field.
    fn visit_child(
        &mut self,
        id: ObjectId,
        expected: ObjectKind,
        owner: Option<ObjectId>,
    ) -> SuspendResult<()> {
        let child = self.get(id)?;
        if child.kind() != expected {
            return Err(SuspendError::Inconsistent(format!(
                "expected a {expected:?} at {id}, found {:?}",
                child.kind()
            )));
        }
        if let Some(owner) = owner {
            let back = match &child.data {
                ObjectData::Cel(cel) => cel.layer,
                ObjectData::Layer(layer) => layer.parent,
                _ => ObjectId::NULL,
            };
            if back != owner {
                return Err(SuspendError::Inconsistent(format!(
                    "{id} is owned by {owner} but points at {back}"
                )));
            }
        }
        self.visit(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        AniDir, BlendMode, Cel, Frame, Image, Layer, LayerFlags, Palette, PixelFormat, Rgba, Tag,
    };

    fn id(raw: u32) -> ObjectId {
        ObjectId::from_raw(raw)
    }

    fn layer_with_cel() -> Subtree {
        Subtree::new(id(10), layer_objects())
    }

    fn layer_objects() -> Vec<Object> {
        vec![
            Object {
                id: id(10),
                version: 3,
                data: ObjectData::Layer(Layer {
                    name: "Ink".into(),
                    parent: id(2),
                    flags: LayerFlags::VISIBLE,
                    opacity: 200,
                    blend: BlendMode::Multiply,
                    content: LayerContent::Image { cels: vec![id(11)] },
                }),
            },
            Object::new(
                id(11),
                ObjectData::Cel(Cel {
                    layer: id(10),
                    frame: 0,
                    x: -3,
                    y: 4,
                    opacity: 128,
                    image: id(12),
                }),
            ),
            Object::new(
                id(12),
                ObjectData::Image(Image {
                    width: 1,
                    height: 2,
                    format: PixelFormat::Grayscale,
                    pixels: vec![1, 2, 3, 4],
                }),
            ),
        ]
    }

    /// Serializes records as given, bypassing the ownership walk.
    fn raw_records(objects: &[Object]) -> Vec<u8> {
        let records = Records {
            root: &objects[0],
            owned: objects[1..].iter().collect(),
        };
        options().serialize(&records).unwrap()
    }

    #[test]
    fn header_layout() {
        let tag = Subtree::new(
            id(0x0102_0304),
            [Object {
                id: id(0x0102_0304),
                version: 7,
                data: ObjectData::Tag(Tag {
                    name: "run".into(),
                    from: 1,
                    to: 2,
                    direction: AniDir::PingPong,
                }),
            }],
        );
        let bytes = encode(&tag).unwrap();
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(&bytes[4..8], &[7, 0, 0, 0]);
        // ObjectData::Tag
        assert_eq!(&bytes[8..12], &[5, 0, 0, 0]);
        assert_eq!(&bytes[12..20], &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[20..23], b"run");
        // from, to, direction, then an empty owned list
        assert_eq!(bytes.len(), 23 + 4 + 4 + 4 + 8);
        assert_eq!(&bytes[35..43], &[0; 8]);
    }

    #[test]
    fn nested_layer_decodes_owner_first() {
        let subtree = layer_with_cel();
        let bytes = encode(&subtree).unwrap();
        let objects = decode(&bytes).unwrap();
        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![id(10), id(11), id(12)]);
        for object in &objects {
            assert_eq!(Some(object), subtree.get(object.id));
        }
    }

    #[test]
    fn frame_lists_its_cels() {
        let mut objects = vec![Object::new(id(20), ObjectData::Frame(Frame { duration: 40 }))];
        objects.extend(layer_objects().into_iter().skip(1));
        let subtree = Subtree::new(id(20), objects);
        let decoded = decode(&encode(&subtree).unwrap()).unwrap();
        let ids: Vec<ObjectId> = decoded.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![id(20), id(11), id(12)]);
    }

    #[test]
    fn truncation_is_detected_everywhere() {
        let bytes = encode(&layer_with_cel()).unwrap();
        for cut in 0..bytes.len() {
            assert_eq!(decode(&bytes[..cut]), Err(SuspendError::Truncated), "cut at {cut}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&layer_with_cel()).unwrap();
        bytes.push(0);
        assert_eq!(decode(&bytes), Err(SuspendError::TrailingBytes(1)));
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let mut bytes = encode(&layer_with_cel()).unwrap();
        bytes[8..12].copy_from_slice(&0xEEu32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(SuspendError::Format(_))));
    }

    #[test]
    fn broken_back_link_is_rejected() {
        let mut objects = layer_objects();
        if let ObjectData::Cel(c) = &mut objects[1].data {
            c.layer = id(99);
        }
        let subtree = Subtree::new(id(10), objects.clone());
        assert!(matches!(encode(&subtree), Err(SuspendError::Inconsistent(_))));
        assert!(matches!(
            decode(&raw_records(&objects)),
            Err(SuspendError::Inconsistent(_))
        ));
    }

    #[test]
    fn out_of_order_records_are_rejected() {
        let mut objects = layer_objects();
        objects.swap(1, 2);
        assert!(matches!(
            decode(&raw_records(&objects)),
            Err(SuspendError::Inconsistent(_))
        ));
    }

    #[test]
    fn duplicate_records_are_rejected() {
        let mut objects = layer_objects();
        objects.push(objects[2].clone());
        assert_eq!(
            decode(&raw_records(&objects)),
            Err(SuspendError::Duplicate(id(12)))
        );
    }

    #[test]
    fn sprite_is_not_suspendable() {
        let graph = crate::graph::ObjectGraph::new(2, 2, PixelFormat::Rgba);
        let sprite = graph.sprite_object();
        let subtree = Subtree::new(sprite.id, [sprite.clone()]);
        assert_eq!(
            encode(&subtree),
            Err(SuspendError::NotSuspendable(ObjectKind::Sprite))
        );
        assert_eq!(
            decode(&raw_records(&[sprite])),
            Err(SuspendError::NotSuspendable(ObjectKind::Sprite))
        );
    }

    #[test]
    fn unreachable_entities_are_rejected() {
        let mut objects = layer_objects();
        objects.push(Object::new(id(50), ObjectData::Frame(Frame { duration: 1 })));
        let subtree = Subtree::new(id(10), objects);
        assert!(matches!(encode(&subtree), Err(SuspendError::Inconsistent(_))));
    }

    #[test]
    fn missing_owned_entity_is_rejected() {
        let objects: Vec<Object> = layer_objects()
            .into_iter()
            .filter(|o| o.id != id(12))
            .collect();
        let subtree = Subtree::new(id(10), objects);
        assert_eq!(encode(&subtree), Err(SuspendError::MissingObject(id(12))));
    }

    #[test]
    fn palette_round_trip() {
        let palette = Subtree::new(
            id(5),
            [Object::new(
                id(5),
                ObjectData::Palette(Palette {
                    colors: vec![Rgba::new(1, 2, 3, 4), Rgba::new(5, 6, 7, 8)],
                }),
            )],
        );
        let objects = decode(&encode(&palette).unwrap()).unwrap();
        assert_eq!(Some(&objects[0]), palette.get(id(5)));
    }
}
