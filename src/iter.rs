/* Fixed-depth quadtree for frustum and segment culling of spatial data.
Copyright (C) 2024  Alexander Pyattaev

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Iterators over the payloads stored in the tree

use crate::coords::GridCoord;
use crate::tree::{Node, QuadTree};

duplicate::duplicate! {
    [
        StructName          reference(lt, type)   slice_iter(lt, type)                getter(n);
        [ElementsIter]      [& 'lt type]          [core::slice::Iter<'lt, type>]      [n.element.as_ref()];
        [ElementsIterMut]   [& 'lt mut type]      [core::slice::IterMut<'lt, type>]   [n.element.as_mut()];
    ]

    ///Iterator over occupied nodes in storage (index) order, yielding the cell
    ///coordinate along with a reference to the payload.
    pub struct StructName<'a, T> {
        nodes: slice_iter([a], [Node<T>]),
    }

    impl<'a, T> Iterator for StructName<'a, T> {
        type Item = (GridCoord, reference([a], [T]));

        #[inline]
        fn next(&mut self) -> Option<Self::Item> {
            // skip empty slots until the next occupied node
            loop {
                let node = self.nodes.next()?;
                let coord = node.coord();
                if let Some(element) = getter([node]) {
                    return Some((coord, element));
                }
            }
        }
    }
}

impl<T> QuadTree<T> {
    /// Iterate over all present payloads and their cell coordinates, in node index order.
    #[inline]
    pub fn iter_elements(&self) -> ElementsIter<'_, T> {
        ElementsIter {
            nodes: self.nodes.iter(),
        }
    }

    /// Iterate over all present payloads as mutable, with their cell coordinates.
    #[inline]
    pub fn iter_elements_mut(&mut self) -> ElementsIterMut<'_, T> {
        ElementsIterMut {
            nodes: self.nodes.iter_mut(),
        }
    }
}
