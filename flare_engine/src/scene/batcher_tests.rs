use super::*;

fn instance(material: u32, model: u32, transform: u32) -> MeshRenderBuffer {
    MeshRenderBuffer {
        material: ProgramHandle::from_raw(material),
        model: ModelHandle::from_raw(model),
        transform: TransformHandle::from_raw(transform),
    }
}

// ============================================================================
// Add
// ============================================================================

#[test]
fn test_same_material_different_models_share_a_stack() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(0, 11, 2));

    assert_eq!(batcher.len(), 1);
    let stack = &batcher.stacks()[0];
    assert_eq!(stack.groups().len(), 2);
    assert_eq!(stack.groups()[0].model, ModelHandle::from_raw(10));
    assert_eq!(stack.groups()[1].model, ModelHandle::from_raw(11));
}

#[test]
fn test_same_model_appends_transform() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(0, 10, 2));

    let stack = &batcher.stacks()[0];
    assert_eq!(stack.groups().len(), 1);
    assert_eq!(stack.groups()[0].transforms, vec![TransformHandle::from_raw(1), TransformHandle::from_raw(2)]);
    assert_eq!(stack.instance_count(), 2);
}

#[test]
fn test_stacks_keep_insertion_order() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(5, 1, 1));
    batcher.add(&instance(2, 1, 1));
    batcher.add(&instance(9, 1, 1));
    batcher.add(&instance(2, 1, 2));

    let order: Vec<u32> = batcher.stacks().iter().map(|s| s.material().raw()).collect();
    assert_eq!(order, vec![5, 2, 9]);
}

// ============================================================================
// Remove
// ============================================================================

#[test]
fn test_removing_last_instance_removes_stack() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(1, 10, 1));

    assert!(batcher.remove(&instance(0, 10, 1)));
    assert_eq!(batcher.len(), 1);
    assert_eq!(batcher.stacks()[0].material(), ProgramHandle::from_raw(1));
}

#[test]
fn test_remove_keeps_order_of_remaining_stacks() {
    let mut batcher = RenderStackBatcher::new();
    for material in 0..4 {
        batcher.add(&instance(material, 0, 0));
    }
    batcher.remove(&instance(1, 0, 0));

    let order: Vec<u32> = batcher.stacks().iter().map(|s| s.material().raw()).collect();
    assert_eq!(order, vec![0, 2, 3]);
}

#[test]
fn test_remove_drops_empty_model_group() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(0, 11, 2));

    assert!(batcher.remove(&instance(0, 10, 1)));
    let stack = &batcher.stacks()[0];
    assert_eq!(stack.groups().len(), 1);
    assert_eq!(stack.groups()[0].model, ModelHandle::from_raw(11));
}

#[test]
fn test_remove_unknown_instance() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));

    assert!(!batcher.remove(&instance(0, 10, 2)));
    assert!(!batcher.remove(&instance(0, 12, 1)));
    assert!(!batcher.remove(&instance(3, 10, 1)));
    assert_eq!(batcher.stacks()[0].instance_count(), 1);
}

#[test]
fn test_duplicate_instance_removed_one_at_a_time() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(0, 10, 1));

    assert!(batcher.remove(&instance(0, 10, 1)));
    assert_eq!(batcher.len(), 1);
    assert!(batcher.remove(&instance(0, 10, 1)));
    assert!(batcher.is_empty());
}

#[test]
fn test_remove_material() {
    let mut batcher = RenderStackBatcher::new();
    batcher.add(&instance(0, 10, 1));
    batcher.add(&instance(0, 11, 2));
    batcher.add(&instance(1, 10, 3));

    assert_eq!(batcher.remove_material(ProgramHandle::from_raw(0)), 2);
    assert_eq!(batcher.len(), 1);
    assert_eq!(batcher.remove_material(ProgramHandle::from_raw(7)), 0);
}
