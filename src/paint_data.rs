// Orbit – A bouncy ball rendering demo
// Copyright (C) 2023  Neil Roberts
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::rc::Rc;
use std::cell::RefCell;
use crate::gpu::Gpu;
use crate::shaders::Shaders;

/// Everything a shape needs to talk to the GPU. Only the thread that
/// owns the GL context ever has one.
pub struct PaintData {
    pub gpu: Rc<dyn Gpu>,
    pub shaders: Shaders,
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<PaintData>>> = RefCell::new(None);
}

impl PaintData {
    pub fn new(gpu: Rc<dyn Gpu>) -> PaintData {
        let shaders = Shaders::new(Rc::clone(&gpu));

        PaintData { gpu, shaders }
    }

    /// Marks this paint data as belonging to the calling thread until
    /// the returned guard is dropped. While it is current, work
    /// submitted to a render queue from this thread runs immediately.
    pub fn make_current(self: &Rc<Self>) -> CurrentGuard {
        let previous = CURRENT.with(|current| {
            current.replace(Some(Rc::clone(self)))
        });

        CurrentGuard { previous }
    }

    pub fn current() -> Option<Rc<PaintData>> {
        CURRENT.with(|current| current.borrow().clone())
    }
}

pub struct CurrentGuard {
    previous: Option<Rc<PaintData>>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| current.replace(previous));
    }
}
