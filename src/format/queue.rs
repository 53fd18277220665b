//! 分段字节队列
//!
//! 两条流水线都用它把长短不一的读取结果切成固定大小的 chunk。
//!
//! 设计：
//! - push 进来的段原样保存，不做合并
//! - 首段足够时 `take(n)` 直接零拷贝切片
//! - 只有请求跨越段边界时才拷贝

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct ByteQueue {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前缓冲的总字节数
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, segment: Bytes) {
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push_back(segment);
    }

    /// 取出恰好 `n` 字节
    ///
    /// # Panics
    ///
    /// 缓冲不足 `n` 字节时 panic。调用方应先检查 `len()`；
    /// 下溢属于分帧逻辑错误，而不是流的状态。
    pub fn take(&mut self, n: usize) -> Bytes {
        assert!(
            n <= self.len,
            "ByteQueue underflow: requested {n} bytes, {} buffered",
            self.len
        );
        self.len -= n;

        if let Some(front) = self.segments.front_mut() {
            if front.len() > n {
                return front.split_to(n);
            }
            if front.len() == n {
                return self.segments.pop_front().unwrap_or_default();
            }
        }

        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            let need = n - out.len();
            if front.len() > need {
                out.extend_from_slice(&front.split_to(need));
            } else {
                out.extend_from_slice(front);
                self.segments.pop_front();
            }
        }
        out.freeze()
    }

    /// 取出当前缓冲的全部数据
    pub fn take_all(&mut self) -> Bytes {
        self.take(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(segments: &[&[u8]]) -> ByteQueue {
        let mut q = ByteQueue::new();
        for s in segments {
            q.push(Bytes::copy_from_slice(s));
        }
        q
    }

    #[test]
    fn take_within_front_segment_is_zero_copy() {
        let segment = Bytes::from_static(b"abcdef");
        let base = segment.as_ptr();
        let mut q = ByteQueue::new();
        q.push(segment);

        let head = q.take(2);
        assert_eq!(&head[..], b"ab");
        assert_eq!(head.as_ptr(), base);
        assert_eq!(q.len(), 4);

        let rest = q.take(4);
        assert_eq!(&rest[..], b"cdef");
        assert_eq!(rest.as_ptr(), base.wrapping_add(2));
        assert!(q.is_empty());
    }

    #[test]
    fn take_spans_segments() {
        let mut q = queue_of(&[b"ab", b"cde", b"f", b"ghij"]);
        assert_eq!(q.len(), 10);
        assert_eq!(&q.take(4)[..], b"abcd");
        assert_eq!(&q.take(3)[..], b"efg");
        assert_eq!(q.len(), 3);
        assert_eq!(&q.take_all()[..], b"hij");
        assert!(q.is_empty());
    }

    #[test]
    fn empty_segments_are_ignored() {
        let mut q = queue_of(&[b"", b"xy", b""]);
        assert_eq!(q.len(), 2);
        assert_eq!(&q.take(2)[..], b"xy");
    }

    #[test]
    fn take_zero_and_take_all_on_empty() {
        let mut q = ByteQueue::new();
        assert!(q.take(0).is_empty());
        assert!(q.take_all().is_empty());
    }

    #[test]
    #[should_panic(expected = "ByteQueue underflow")]
    fn take_past_end_panics() {
        let mut q = queue_of(&[b"abc"]);
        q.take(4);
    }
}
