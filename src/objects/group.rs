use super::ObjectRef;
use std::rc::Rc;

/// Container moving its children as one.
#[derive(Default)]
pub struct Group {
    children: Vec<ObjectRef>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[ObjectRef] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child_at(&self, index: usize) -> Option<ObjectRef> {
        self.children.get(index).cloned()
    }

    /// Last killed child, handy for pooling.
    pub fn first_dead(&self) -> Option<ObjectRef> {
        self.children
            .iter()
            .rev()
            .find(|child| !child.borrow().base.alive())
            .cloned()
    }

    pub(crate) fn push(&mut self, child: ObjectRef) {
        self.children.push(child);
    }

    pub(crate) fn remove(&mut self, child: &ObjectRef) {
        self.children.retain(|other| !Rc::ptr_eq(other, child));
    }

    pub(crate) fn update(&mut self, delta_time: f64) {
        for index in (0..self.children.len()).rev() {
            let child = self.children[index].clone();
            let mut child = child.borrow_mut();
            if child.base.is_pending_destroy() {
                self.children.remove(index);
            } else if child.base.alive() {
                child.update(delta_time);
            }
        }
    }

    pub(crate) fn destroy_children(&mut self) {
        for child in self.children.drain(..).rev() {
            child.borrow_mut().destroy();
        }
    }
}
